use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("invalid selector")]
    InvalidSelector,
    #[error("element handle is stale")]
    StaleElement,
    #[error("page is closed")]
    PageClosed,
    #[error("browser launch failed")]
    LaunchFailed,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn is_stale(&self) -> bool {
        self.kind == AdapterErrorKind::StaleElement
    }

    pub fn is_invalid_selector(&self) -> bool {
        self.kind == AdapterErrorKind::InvalidSelector
    }
}

impl From<chromiumoxide::error::CdpError> for AdapterError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::Timeout => AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint("request timed out")
                .retriable(true),
            CdpError::NotFound => AdapterError::new(AdapterErrorKind::TargetNotFound),
            other => AdapterError::new(AdapterErrorKind::CdpIo).with_hint(other.to_string()),
        }
    }
}
