use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::errors::TypeTextError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingPolicy {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fixed seed for reproducible cadence; fresh entropy when unset.
    pub seed: Option<u64>,
    pub max_text_len: usize,
    pub clear_before_typing: bool,
}

impl Default for TypingPolicy {
    fn default() -> Self {
        Self {
            min_delay_ms: 50,
            max_delay_ms: 150,
            seed: None,
            max_text_len: 8000,
            clear_before_typing: true,
        }
    }
}

impl TypingPolicy {
    pub fn delay_range(&self) -> Result<RangeInclusive<u64>, TypeTextError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(TypeTextError::InvalidDelayRange {
                min: self.min_delay_ms,
                max: self.max_delay_ms,
            });
        }
        Ok(self.min_delay_ms..=self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<(), TypeTextError> {
        self.delay_range().map(|_| ())
    }
}
