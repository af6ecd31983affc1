//! Reply capture for browser-driven chat pages.
//!
//! After a message is submitted the reply container is discovered, then
//! polled until its text stops changing for a configured number of ticks.
//! [`ResponseCaptor::wait_for_reply`] returns the settled text;
//! [`ResponseCaptor::stream_reply`] yields forward-only fragments as the
//! text grows and shares the same settle policy.

pub mod captor;
pub mod config;
pub mod differ;
pub mod errors;
pub mod state;
pub mod stream;

pub use captor::ResponseCaptor;
pub use config::{CaptureConfig, PollCadence};
pub use differ::StreamDiffer;
pub use errors::CaptureError;
pub use state::{CapturePhase, CaptureState, SettleDetector, TickOutcome};
pub use stream::ReplyStream;
