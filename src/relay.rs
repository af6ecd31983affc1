//! Wires the browser host, the notification hub and one session per
//! configured channel.

use std::sync::Arc;

use action_locator::SelectorResolver;
use cdp_adapter::{ChromiumHost, PageProvider};
use channel_session::{ChannelError, ChannelRegistry, ChannelSession, DomAuthProvider};
use chatrelay_core_types::{ChannelEvent, ChannelId};
use chatrelay_event_bus::NotificationHub;
use tracing::{debug, info};

use crate::config::RelayConfig;

pub struct Relay {
    host: Option<Arc<ChromiumHost>>,
    hub: Arc<NotificationHub<ChannelEvent>>,
    registry: ChannelRegistry,
}

impl Relay {
    /// Sessions for every configured channel, backed by a lazily launched
    /// Chromium.
    pub fn new(config: &RelayConfig) -> Result<Self, ChannelError> {
        let host = Arc::new(ChromiumHost::new(config.browser.clone()));
        let mut relay = Self::with_provider(config, host.clone())?;
        relay.host = Some(host);
        Ok(relay)
    }

    /// Same wiring over any page provider.
    pub fn with_provider(
        config: &RelayConfig,
        provider: Arc<dyn PageProvider>,
    ) -> Result<Self, ChannelError> {
        let hub = NotificationHub::new(config.event_buffer);
        let registry = ChannelRegistry::new();
        let settings = config.session_settings();
        for profile in config.profiles() {
            let auth = DomAuthProvider::new(
                profile.clone(),
                SelectorResolver::new(settings.resolver.clone()),
                settings.timeouts.clone(),
            );
            let session = ChannelSession::new(
                profile,
                Arc::clone(&provider),
                Arc::new(auth),
                Arc::clone(&hub),
                settings.clone(),
            )?;
            debug!(channel = %session.id(), "channel registered");
            registry.register(session);
        }
        Ok(Self {
            host: None,
            hub,
            registry,
        })
    }

    pub fn hub(&self) -> &Arc<NotificationHub<ChannelEvent>> {
        &self.hub
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Enabled session for `raw`, initialized and ready for use.
    pub async fn open(&self, raw: &str) -> Result<ChannelSession, ChannelError> {
        let id = ChannelId::parse(raw).map_err(|err| ChannelError::ChannelUnavailable {
            channel: raw.to_string(),
            reason: err.to_string(),
        })?;
        if !self.registry.is_available(&id) {
            return Err(ChannelError::ChannelUnavailable {
                channel: raw.to_string(),
                reason: "unknown or disabled channel".into(),
            });
        }
        let session = self
            .registry
            .get(&id)
            .ok_or_else(|| ChannelError::ChannelUnavailable {
                channel: raw.to_string(),
                reason: "channel is not registered".into(),
            })?;
        session.initialize().await?;
        Ok(session)
    }

    /// Destroy every session, then stop the browser.
    pub async fn shutdown(&self) {
        self.registry.destroy_all().await;
        if let Some(host) = &self.host {
            host.shutdown().await;
        }
        info!("relay shut down");
    }
}
