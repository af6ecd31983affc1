use std::time::Duration;

use action_locator::ResolverPolicy;
use response_capture::CaptureConfig;
use serde::{Deserialize, Serialize};
use tool_type_text::TypingPolicy;

/// Wall-clock limits for page-level session steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimeouts {
    pub navigation_ms: u64,
    /// How often a pending manual login is re-checked.
    pub login_poll_ms: u64,
    pub login_timeout_ms: u64,
    pub logout_settle_ms: u64,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            login_poll_ms: 2_000,
            login_timeout_ms: 300_000,
            logout_settle_ms: 2_000,
        }
    }
}

impl SessionTimeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn login_poll(&self) -> Duration {
        Duration::from_millis(self.login_poll_ms.max(1))
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn logout_settle(&self) -> Duration {
        Duration::from_millis(self.logout_settle_ms)
    }
}

/// Everything a session needs besides its profile and collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub typing: TypingPolicy,
    pub resolver: ResolverPolicy,
    pub capture: CaptureConfig,
    pub timeouts: SessionTimeouts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings: SessionSettings =
            serde_yaml::from_str("timeouts:\n  login_poll_ms: 10\n").unwrap();
        assert_eq!(settings.timeouts.login_poll_ms, 10);
        assert_eq!(settings.timeouts.login_timeout_ms, 300_000);
        assert_eq!(settings.capture.stable_ticks, 5);
    }
}
