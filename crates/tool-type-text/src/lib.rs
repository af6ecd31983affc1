pub mod context;
pub mod errors;
pub mod plan;
pub mod policy;
pub mod redact;
pub mod simulator;

pub use context::render_context_block;
pub use errors::TypeTextError;
pub use plan::{TypingPlan, TypingStep};
pub use policy::TypingPolicy;
pub use simulator::{TypingReport, TypingSimulator};
