//! Login gate for a channel.
//!
//! The session treats authentication as an opaque boolean: it asks an
//! [`AuthProvider`] and never touches credentials, cookies or storage.

use std::sync::Arc;

use action_locator::{Capability, Resolution, SelectorResolver};
use async_trait::async_trait;
use cdp_adapter::{PageHandle, WaitUntil};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::errors::ChannelError;
use crate::profile::ChannelProfile;
use crate::settings::SessionTimeouts;

/// Result of one login check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl AuthState {
    pub fn authenticated() -> Self {
        Self {
            is_authenticated: true,
            checked_at: Utc::now(),
            error: None,
        }
    }

    pub fn unauthenticated(error: Option<String>) -> Self {
        Self {
            is_authenticated: false,
            checked_at: Utc::now(),
            error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    /// The user has to finish logging in by hand in the browser window.
    pub needs_manual_login: bool,
}

impl AuthResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Called once with the session's page before any other method.
    async fn initialize(&self, page: Arc<dyn PageHandle>) -> Result<(), ChannelError>;

    async fn check_auth_status(&self) -> AuthState;

    async fn authenticate(&self) -> AuthResult;

    async fn logout(&self) -> Result<(), ChannelError>;

    /// Drop any page reference; must tolerate repeated calls.
    async fn cleanup(&self) {}
}

/// Decides login state from the page itself: a user avatar (or similar
/// `LoginIndicator` element) on the channel home means logged in.
pub struct DomAuthProvider {
    profile: ChannelProfile,
    resolver: SelectorResolver,
    timeouts: SessionTimeouts,
    page: RwLock<Option<Arc<dyn PageHandle>>>,
}

impl DomAuthProvider {
    pub fn new(
        profile: ChannelProfile,
        resolver: SelectorResolver,
        timeouts: SessionTimeouts,
    ) -> Self {
        Self {
            profile,
            resolver,
            timeouts,
            page: RwLock::new(None),
        }
    }

    fn page(&self) -> Option<Arc<dyn PageHandle>> {
        self.page.read().clone()
    }

    async fn indicator_present(&self, page: &Arc<dyn PageHandle>) -> bool {
        matches!(
            self.resolver
                .resolve(
                    page,
                    Capability::LoginIndicator,
                    self.profile.candidates(Capability::LoginIndicator),
                    None,
                )
                .await,
            Resolution::Found(_)
        )
    }
}

#[async_trait]
impl AuthProvider for DomAuthProvider {
    async fn initialize(&self, page: Arc<dyn PageHandle>) -> Result<(), ChannelError> {
        *self.page.write() = Some(page);
        Ok(())
    }

    #[instrument(skip_all, fields(channel = %self.profile.id))]
    async fn check_auth_status(&self) -> AuthState {
        let Some(page) = self.page() else {
            return AuthState::unauthenticated(Some("auth provider not initialized".into()));
        };
        if let Err(err) = page
            .navigate(
                &self.profile.home_url,
                WaitUntil::DocumentComplete,
                self.timeouts.navigation(),
            )
            .await
        {
            warn!(error = %err, url = %self.profile.home_url, "login check navigation failed");
            return AuthState::unauthenticated(Some(err.to_string()));
        }
        let logged_in = self.indicator_present(&page).await;
        debug!(logged_in, "login indicator checked");
        if logged_in {
            AuthState::authenticated()
        } else {
            AuthState::unauthenticated(None)
        }
    }

    /// Open the login page and wait for the user to log in by hand.
    #[instrument(skip_all, fields(channel = %self.profile.id))]
    async fn authenticate(&self) -> AuthResult {
        if self.check_auth_status().await.is_authenticated {
            return AuthResult::ok("already logged in");
        }
        let Some(page) = self.page() else {
            return AuthResult::failed("auth provider not initialized");
        };
        if let Err(err) = page
            .navigate(
                &self.profile.login_url,
                WaitUntil::DocumentComplete,
                self.timeouts.navigation(),
            )
            .await
        {
            return AuthResult::failed(err.to_string());
        }

        info!(
            url = %self.profile.login_url,
            timeout_ms = self.timeouts.login_timeout_ms,
            "waiting for manual login"
        );
        let deadline = Instant::now() + self.timeouts.login_timeout();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            page.sleep(self.timeouts.login_poll().min(deadline - now)).await;
            if self.indicator_present(&page).await {
                info!("manual login completed");
                return AuthResult::ok("logged in");
            }
        }

        warn!(
            timeout_ms = self.timeouts.login_timeout_ms,
            "manual login not completed"
        );
        AuthResult {
            success: false,
            message: Some(format!("log in to {} in the browser window", self.profile.name)),
            error: Some(format!(
                "login not completed within {}ms",
                self.timeouts.login_timeout_ms
            )),
            needs_manual_login: true,
        }
    }

    #[instrument(skip_all, fields(channel = %self.profile.id))]
    async fn logout(&self) -> Result<(), ChannelError> {
        let page = self.page().ok_or_else(|| ChannelError::Auth {
            channel: self.profile.id.clone(),
            message: "auth provider not initialized".into(),
        })?;
        page.navigate(
            &self.profile.home_url,
            WaitUntil::DocumentComplete,
            self.timeouts.navigation(),
        )
        .await
        .map_err(|err| ChannelError::from_browser(&self.profile.id, err))?;

        let control = self
            .resolver
            .resolve(
                &page,
                Capability::LogoutControl,
                self.profile.candidates(Capability::LogoutControl),
                None,
            )
            .await;
        match control.found() {
            Some(control) => {
                control
                    .click()
                    .await
                    .map_err(|err| ChannelError::from_locator(&self.profile.id, err))?;
                page.sleep(self.timeouts.logout_settle()).await;
                info!("logged out");
            }
            None => warn!("no logout control found; session may still be logged in"),
        }
        Ok(())
    }

    async fn cleanup(&self) {
        self.page.write().take();
    }
}
