//! Capability-based element location.
//!
//! A page integration describes each UI role it needs (input box, send
//! button, reply container, ...) as an ordered list of selector candidates.
//! The resolver walks that list in priority order, skips candidates that
//! fail, and optionally sweeps the whole list again until a budget elapses.

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use types::*;
