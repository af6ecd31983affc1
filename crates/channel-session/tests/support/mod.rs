#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use action_locator::{CandidateSet, Capability, LocatorCandidate};
use async_trait::async_trait;
use cdp_adapter::mock::{MockProvider, ScriptedPage};
use cdp_adapter::PageHandle;
use channel_session::{
    AuthProvider, AuthResult, AuthState, ChannelError, ChannelProfile, ChannelSession,
    SessionSettings,
};
use chatrelay_core_types::{ChannelEvent, ChannelId, EventKind};
use chatrelay_event_bus::NotificationHub;
use parking_lot::Mutex;
use tool_type_text::TypingPolicy;

pub const CHAT_URL: &str = "https://chat.test/c";

/// Auth collaborator with a switchable answer.
#[derive(Default)]
pub struct FakeAuth {
    pub logged_in: AtomicBool,
    pub checks: AtomicUsize,
    pub fail_init: AtomicBool,
}

impl FakeAuth {
    pub fn logged_in() -> Arc<Self> {
        let auth = Self::default();
        auth.logged_in.store(true, Ordering::SeqCst);
        Arc::new(auth)
    }

    pub fn logged_out() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn initialize(&self, _page: Arc<dyn PageHandle>) -> Result<(), ChannelError> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(ChannelError::Auth {
                channel: ChannelId::from_static("test"),
                message: "profile locked".into(),
            });
        }
        Ok(())
    }

    async fn check_auth_status(&self) -> AuthState {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.logged_in.load(Ordering::SeqCst) {
            AuthState::authenticated()
        } else {
            AuthState::unauthenticated(None)
        }
    }

    async fn authenticate(&self) -> AuthResult {
        self.logged_in.store(true, Ordering::SeqCst);
        AuthResult::ok("logged in")
    }

    async fn logout(&self) -> Result<(), ChannelError> {
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub fn profile(id: &'static str) -> ChannelProfile {
    let mut profile = ChannelProfile::doubao();
    profile.id = ChannelId::from_static(id);
    profile.name = id.to_string();
    profile.chat_url = CHAT_URL.to_string();
    profile.locators = CandidateSet::new()
        .with(
            Capability::InputBox,
            vec![
                LocatorCandidate::new("textarea.prompt", "prompt"),
                LocatorCandidate::new("#prompt", "prompt id"),
            ],
        )
        .with(
            Capability::SendButton,
            vec![LocatorCandidate::new("#send", "send")],
        )
        .with(
            Capability::ResponseContainer,
            vec![LocatorCandidate::new(".reply", "reply")],
        )
        .with(
            Capability::LoadingIndicator,
            vec![LocatorCandidate::new(".loading", "loading")],
        );
    profile
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        typing: TypingPolicy {
            min_delay_ms: 1,
            max_delay_ms: 2,
            seed: Some(7),
            ..TypingPolicy::default()
        },
        ..SessionSettings::default()
    }
}

pub struct Harness {
    pub page: Arc<ScriptedPage>,
    pub provider: Arc<MockProvider>,
    pub auth: Arc<FakeAuth>,
    pub hub: Arc<NotificationHub<ChannelEvent>>,
    pub session: ChannelSession,
}

impl Harness {
    pub fn new(auth: Arc<FakeAuth>) -> Self {
        Self::with_profile(profile("test"), auth)
    }

    pub fn with_profile(profile: ChannelProfile, auth: Arc<FakeAuth>) -> Self {
        let page = ScriptedPage::new();
        page.set_element("#prompt", "");
        page.set_element("#send", "Send");
        let provider = MockProvider::new(Arc::clone(&page));
        let hub = NotificationHub::new(64);
        let session = ChannelSession::new(
            profile,
            provider.clone(),
            auth.clone(),
            Arc::clone(&hub),
            settings(),
        )
        .expect("valid session");
        Self {
            page,
            provider,
            auth,
            hub,
            session,
        }
    }

    /// Every event kind this session publishes, in order.
    pub fn record(&self) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        self.session
            .subscribe_all(move |event| sink.lock().push(event.kind()));
        seen
    }
}
