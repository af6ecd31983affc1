//! Error types for locator system

use cdp_adapter::AdapterError;
use thiserror::Error;

use crate::types::Capability;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No candidate matched within the budget
    #[error("no element for {capability} after {sweeps} sweep(s) over {candidates} candidate(s) in {elapsed_ms}ms")]
    NotFound {
        capability: Capability,
        candidates: usize,
        sweeps: u32,
        elapsed_ms: u64,
    },

    /// Handle outlived the document it was resolved in
    #[error("stale {capability} element '{selector}': page navigated since resolution")]
    StaleElement {
        capability: Capability,
        selector: String,
    },

    /// Page operation on a resolved element failed
    #[error("page error: {0}")]
    Page(#[from] AdapterError),

    /// Resolution abandoned by the caller
    #[error("resolution of {0} cancelled")]
    Cancelled(Capability),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::NotFound { .. } => true,
            LocatorError::Page(err) => err.retriable,
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::StaleElement { .. } => 3,
            LocatorError::Page(_) => 2,
            LocatorError::NotFound { .. } => 1,
            LocatorError::Cancelled(_) => 0,
        }
    }
}
