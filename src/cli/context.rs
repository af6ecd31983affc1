use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chatrelay_core_types::ChannelEvent;
use tokio::sync::OnceCell;

use crate::config::RelayConfig;
use crate::relay::Relay;

pub struct CliContext {
    config: Arc<RelayConfig>,
    config_path: PathBuf,
    print_events: bool,
    relay: OnceCell<Arc<Relay>>,
}

impl CliContext {
    pub fn new(config: RelayConfig, config_path: PathBuf, print_events: bool) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            print_events,
            relay: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Relay built on first use; the browser itself starts with the first
    /// session that needs a page.
    pub async fn relay(&self) -> Result<Arc<Relay>> {
        self.relay
            .get_or_try_init(|| async {
                let relay = Relay::new(&self.config)?;
                if self.print_events {
                    relay.hub().subscribe_all(print_event);
                }
                Ok::<_, anyhow::Error>(Arc::new(relay))
            })
            .await
            .map(Arc::clone)
    }

    pub async fn shutdown(&self) {
        if let Some(relay) = self.relay.get() {
            relay.shutdown().await;
        }
    }
}

fn print_event(event: &ChannelEvent) {
    let at = event.at.format("%H:%M:%S%.3f");
    match serde_json::to_string(&event.payload) {
        Ok(payload) => eprintln!("[{at}] {} {payload}", event.channel),
        Err(_) => eprintln!("[{at}] {} {}", event.channel, event.kind()),
    }
}
