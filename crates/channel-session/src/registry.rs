//! Explicitly constructed set of channel sessions.

use std::collections::BTreeMap;

use chatrelay_core_types::{ChannelId, ChannelStatus};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::ChannelError;
use crate::session::ChannelSession;

struct Entry {
    session: ChannelSession,
    enabled: bool,
}

/// Row of [`ChannelRegistry::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub name: String,
    pub description: String,
    pub website: String,
    pub enabled: bool,
    pub status: ChannelStatus,
}

#[derive(Default)]
pub struct ChannelRegistry {
    entries: RwLock<BTreeMap<ChannelId, Entry>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the session for its channel id. The profile's
    /// `enabled` flag is the initial state.
    pub fn register(&self, session: ChannelSession) -> Option<ChannelSession> {
        let id = session.id().clone();
        let enabled = session.profile().enabled;
        self.entries
            .write()
            .insert(id, Entry { session, enabled })
            .map(|previous| previous.session)
    }

    pub fn get(&self, id: &ChannelId) -> Option<ChannelSession> {
        self.entries.read().get(id).map(|entry| entry.session.clone())
    }

    pub fn list(&self) -> Vec<ChannelSummary> {
        self.entries
            .read()
            .values()
            .map(|entry| {
                let profile = entry.session.profile();
                ChannelSummary {
                    id: profile.id.clone(),
                    name: profile.name.clone(),
                    description: profile.description.clone(),
                    website: profile.website.clone(),
                    enabled: entry.enabled,
                    status: entry.session.get_status(),
                }
            })
            .collect()
    }

    /// Registered and enabled.
    pub fn is_available(&self, id: &ChannelId) -> bool {
        self.entries
            .read()
            .get(id)
            .map_or(false, |entry| entry.enabled)
    }

    /// Returns `false` for an unknown channel.
    pub fn set_enabled(&self, id: &ChannelId, enabled: bool) -> bool {
        match self.entries.write().get_mut(id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn enabled_sessions(&self) -> Vec<ChannelSession> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.session.clone())
            .collect()
    }

    /// Initialize every enabled session; failures are collected, not fatal.
    pub async fn initialize_all(&self) -> Vec<(ChannelId, ChannelError)> {
        let mut failures = Vec::new();
        for session in self.enabled_sessions() {
            if let Err(err) = session.initialize().await {
                warn!(channel = %session.id(), error = %err, "channel failed to initialize");
                failures.push((session.id().clone(), err));
            }
        }
        failures
    }

    pub async fn destroy_all(&self) {
        let sessions: Vec<ChannelSession> = self
            .entries
            .read()
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        for session in sessions {
            session.destroy().await;
        }
    }

    /// Make `to` the active channel. Returns whether it is logged in.
    pub async fn switch_channel(
        &self,
        from: Option<&ChannelId>,
        to: &ChannelId,
    ) -> Result<bool, ChannelError> {
        let target = match self.entries.read().get(to) {
            Some(entry) if entry.enabled => entry.session.clone(),
            Some(_) => {
                return Err(ChannelError::ChannelUnavailable {
                    channel: to.to_string(),
                    reason: "channel is disabled".into(),
                })
            }
            None => {
                return Err(ChannelError::ChannelUnavailable {
                    channel: to.to_string(),
                    reason: "channel is not registered".into(),
                })
            }
        };
        let authenticated = target.is_authenticated().await;
        info!(
            from = from.map(ChannelId::as_str).unwrap_or("-"),
            to = %to,
            authenticated,
            "switched channel"
        );
        Ok(authenticated)
    }
}
