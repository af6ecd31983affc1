use std::fmt;

use action_locator::{Capability, LocatorError};
use cdp_adapter::AdapterError;
use chatrelay_core_types::ChannelId;
use thiserror::Error;
use tool_type_text::TypeTextError;

/// Where a session is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Ready,
    Destroyed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Created => "not initialized",
            Lifecycle::Ready => "ready",
            Lifecycle::Destroyed => "destroyed",
        })
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    /// Recoverable by calling `authenticate()`.
    #[error("channel '{channel}' is not authenticated; log in first")]
    NotAuthenticated { channel: ChannelId },

    #[error("channel '{channel}': no {capability} found ({candidates} candidates, {elapsed_ms}ms); page markup may have changed")]
    ElementNotFound {
        channel: ChannelId,
        capability: Capability,
        candidates: usize,
        elapsed_ms: u64,
    },

    #[error("channel '{channel}': no reply appeared within {elapsed_ms}ms ({candidates} candidates); the message may not have been sent")]
    ReplyDiscoveryTimeout {
        channel: ChannelId,
        elapsed_ms: u64,
        candidates: usize,
    },

    #[error("channel '{channel}': reply still changing after {elapsed_ms}ms ({ticks} polls)")]
    ReplySettleTimeout {
        channel: ChannelId,
        elapsed_ms: u64,
        ticks: u32,
    },

    #[error("channel '{channel}': cannot {operation} while session is {state}")]
    SessionLifecycle {
        channel: ChannelId,
        operation: &'static str,
        state: Lifecycle,
    },

    #[error("channel '{channel}': reply settled with no text")]
    EmptyReply { channel: ChannelId },

    #[error("channel '{channel}': browser error: {source}")]
    Browser {
        channel: ChannelId,
        #[source]
        source: AdapterError,
    },

    #[error("channel '{channel}': {source}")]
    Locator {
        channel: ChannelId,
        #[source]
        source: LocatorError,
    },

    #[error("channel '{channel}': typing failed: {source}")]
    Typing {
        channel: ChannelId,
        #[source]
        source: TypeTextError,
    },

    #[error("channel '{channel}': authentication provider failed: {message}")]
    Auth { channel: ChannelId, message: String },

    #[error("channel '{channel}': operation cancelled")]
    Cancelled { channel: ChannelId },

    #[error("channel '{channel}' is unavailable: {reason}")]
    ChannelUnavailable { channel: String, reason: String },

    #[error("invalid session settings: {0}")]
    InvalidSettings(String),
}

impl ChannelError {
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, ChannelError::NotAuthenticated { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ChannelError::ReplyDiscoveryTimeout { .. } | ChannelError::ReplySettleTimeout { .. }
        )
    }

    /// Short machine-readable tag, used in logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::NotAuthenticated { .. } => "not_authenticated",
            ChannelError::ElementNotFound { .. } => "element_not_found",
            ChannelError::ReplyDiscoveryTimeout { .. } => "reply_discovery_timeout",
            ChannelError::ReplySettleTimeout { .. } => "reply_settle_timeout",
            ChannelError::SessionLifecycle { .. } => "session_lifecycle",
            ChannelError::EmptyReply { .. } => "empty_reply",
            ChannelError::Browser { .. } => "browser",
            ChannelError::Locator { .. } => "locator",
            ChannelError::Typing { .. } => "typing",
            ChannelError::Auth { .. } => "auth",
            ChannelError::Cancelled { .. } => "cancelled",
            ChannelError::ChannelUnavailable { .. } => "channel_unavailable",
            ChannelError::InvalidSettings(_) => "invalid_settings",
        }
    }

    pub(crate) fn from_locator(channel: &ChannelId, err: LocatorError) -> Self {
        match err {
            LocatorError::NotFound {
                capability,
                candidates,
                elapsed_ms,
                ..
            } => ChannelError::ElementNotFound {
                channel: channel.clone(),
                capability,
                candidates,
                elapsed_ms,
            },
            LocatorError::Cancelled(_) => ChannelError::Cancelled {
                channel: channel.clone(),
            },
            other => ChannelError::Locator {
                channel: channel.clone(),
                source: other,
            },
        }
    }

    pub(crate) fn from_capture(channel: &ChannelId, err: response_capture::CaptureError) -> Self {
        use response_capture::CaptureError;
        match err {
            CaptureError::DiscoveryTimeout {
                elapsed_ms,
                candidates,
                ..
            } => ChannelError::ReplyDiscoveryTimeout {
                channel: channel.clone(),
                elapsed_ms,
                candidates,
            },
            CaptureError::SettleTimeout {
                elapsed_ms, ticks, ..
            } => ChannelError::ReplySettleTimeout {
                channel: channel.clone(),
                elapsed_ms,
                ticks,
            },
            CaptureError::EmptyReply { .. } => ChannelError::EmptyReply {
                channel: channel.clone(),
            },
            CaptureError::Locator(err) => ChannelError::from_locator(channel, err),
            CaptureError::Cancelled => ChannelError::Cancelled {
                channel: channel.clone(),
            },
        }
    }

    pub(crate) fn from_typing(channel: &ChannelId, err: TypeTextError) -> Self {
        ChannelError::Typing {
            channel: channel.clone(),
            source: err,
        }
    }

    pub(crate) fn from_browser(channel: &ChannelId, err: AdapterError) -> Self {
        ChannelError::Browser {
            channel: channel.clone(),
            source: err,
        }
    }
}
