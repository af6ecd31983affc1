use action_locator::LocatorError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CaptureError {
    /// The reply container never appeared; the send probably did not register.
    #[error("no reply element appeared within {elapsed_ms}ms ({sweeps} sweeps over {candidates} candidates)")]
    DiscoveryTimeout {
        elapsed_ms: u64,
        candidates: usize,
        sweeps: u32,
    },

    /// The reply appeared but kept changing past the generation cap.
    #[error("reply did not settle within {elapsed_ms}ms ({ticks} polls, {last_len} chars so far)")]
    SettleTimeout {
        elapsed_ms: u64,
        ticks: u32,
        last_len: usize,
    },

    #[error("reply settled with no text after {ticks} polls")]
    EmptyReply { ticks: u32 },

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("capture cancelled")]
    Cancelled,
}

impl CaptureError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CaptureError::DiscoveryTimeout { .. } | CaptureError::SettleTimeout { .. }
        )
    }
}
