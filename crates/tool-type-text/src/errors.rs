use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeTextError {
    #[error("text exceeds max length ({0})")]
    TextTooLong(usize),
    #[error("invalid delay range {min}..={max}ms")]
    InvalidDelayRange { min: u64, max: u64 },
    #[error("keystroke dispatch failed: {0}")]
    Page(#[from] AdapterError),
}

impl TypeTextError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TypeTextError::Page(err) if err.retriable)
    }
}
