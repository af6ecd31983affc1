use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Discovery sweep interval and generation poll interval for one call path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCadence {
    pub discovery_interval_ms: u64,
    pub poll_interval_ms: u64,
}

impl PollCadence {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Overall budget for the reply container to appear.
    pub discovery_timeout_ms: u64,
    /// Consecutive unchanged polls that count as "finished".
    pub stable_ticks: u32,
    pub blocking: PollCadence,
    pub streaming: PollCadence,
    /// Cap on time spent generating once the container appeared. Unbounded
    /// when unset.
    pub max_generation_ms: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: 30_000,
            stable_ticks: 5,
            blocking: PollCadence {
                discovery_interval_ms: 1_000,
                poll_interval_ms: 500,
            },
            streaming: PollCadence {
                discovery_interval_ms: 500,
                poll_interval_ms: 200,
            },
            max_generation_ms: None,
        }
    }
}

impl CaptureConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn max_generation(&self) -> Option<Duration> {
        self.max_generation_ms.map(Duration::from_millis)
    }
}
