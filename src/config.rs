//! Configuration for the relay binary.
//!
//! One YAML document; every section falls back to its defaults so a
//! missing or empty file is a working configuration.

use action_locator::ResolverPolicy;
use cdp_adapter::CdpConfig;
use channel_session::{ChannelProfile, SessionSettings, SessionTimeouts};
use response_capture::CaptureConfig;
use serde::{Deserialize, Serialize};
use tool_type_text::TypingPolicy;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub browser: CdpConfig,
    pub typing: TypingPolicy,
    pub resolver: ResolverPolicy,
    pub capture: CaptureConfig,
    pub session: SessionTimeouts,
    /// Channel profiles; the built-in Doubao profile when empty.
    pub channels: Vec<ChannelProfile>,
    /// Capacity of the async event feed.
    pub event_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            browser: CdpConfig::default(),
            typing: TypingPolicy::default(),
            resolver: ResolverPolicy::default(),
            capture: CaptureConfig::default(),
            session: SessionTimeouts::default(),
            channels: Vec::new(),
            event_buffer: 256,
        }
    }
}

impl RelayConfig {
    pub fn profiles(&self) -> Vec<ChannelProfile> {
        if self.channels.is_empty() {
            vec![ChannelProfile::doubao()]
        } else {
            self.channels.clone()
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            typing: self.typing.clone(),
            resolver: self.resolver.clone(),
            capture: self.capture.clone(),
            timeouts: self.session.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_builtin_channel() {
        let config: RelayConfig = serde_yaml::from_str("{}").unwrap();
        let profiles = config.profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id.as_str(), "doubao");
        assert_eq!(config.session_settings().capture.stable_ticks, 5);
    }
}
