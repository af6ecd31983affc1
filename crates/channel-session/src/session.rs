use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use action_locator::{
    Capability, LocatorError, Pick, Resolution, ResolvedElement, SelectorResolver,
};
use cdp_adapter::{KeyInput, PageHandle, PageProvider, WaitUntil};
use chatrelay_core_types::{
    ChannelEvent, ChannelId, ChannelStatus, ChatContext, EventKind, EventPayload,
};
use chatrelay_event_bus::{NotificationHub, SubscriptionId};
use chrono::Utc;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use parking_lot::{Mutex, RwLock};
use response_capture::{ReplyStream, ResponseCaptor};
use tokio::sync::{broadcast, OwnedMutexGuard};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tool_type_text::TypingSimulator;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{AuthProvider, AuthResult};
use crate::errors::{ChannelError, Lifecycle};
use crate::profile::ChannelProfile;
use crate::settings::{SessionSettings, SessionTimeouts};

/// One chat page driven on behalf of a single channel.
///
/// Sends are serialized: a second `send_message` or stream waits until the
/// previous one has finished (or its stream was dropped). Cloning is cheap
/// and clones share the same session.
#[derive(Clone)]
pub struct ChannelSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession").finish_non_exhaustive()
    }
}

struct SessionInner {
    profile: ChannelProfile,
    provider: Arc<dyn PageProvider>,
    auth: Arc<dyn AuthProvider>,
    hub: Arc<NotificationHub<ChannelEvent>>,
    typing: TypingSimulator,
    resolver: SelectorResolver,
    captor: ResponseCaptor,
    timeouts: SessionTimeouts,
    lifecycle: Mutex<Lifecycle>,
    page: RwLock<Option<Arc<dyn PageHandle>>>,
    status: Mutex<ChannelStatus>,
    exclusive: Arc<tokio::sync::Mutex<()>>,
    /// Cancelled by `destroy`; every send and stream runs under a child.
    shutdown: CancellationToken,
}

impl ChannelSession {
    pub fn new(
        profile: ChannelProfile,
        provider: Arc<dyn PageProvider>,
        auth: Arc<dyn AuthProvider>,
        hub: Arc<NotificationHub<ChannelEvent>>,
        settings: SessionSettings,
    ) -> Result<Self, ChannelError> {
        let missing = profile.missing_capabilities();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(Capability::name).collect();
            return Err(ChannelError::InvalidSettings(format!(
                "channel '{}' has no candidates for {}",
                profile.id,
                names.join(", ")
            )));
        }
        let typing = TypingSimulator::new(settings.typing)
            .map_err(|err| ChannelError::InvalidSettings(err.to_string()))?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                profile,
                provider,
                auth,
                hub,
                typing,
                resolver: SelectorResolver::new(settings.resolver),
                captor: ResponseCaptor::new(settings.capture),
                timeouts: settings.timeouts,
                lifecycle: Mutex::new(Lifecycle::Created),
                page: RwLock::new(None),
                status: Mutex::new(ChannelStatus::disconnected()),
                exclusive: Arc::new(tokio::sync::Mutex::new(())),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn id(&self) -> &ChannelId {
        &self.inner.profile.id
    }

    pub fn profile(&self) -> &ChannelProfile {
        &self.inner.profile
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.lock()
    }

    /// Acquire the page and hand it to the auth provider. A failure leaves
    /// the session unusable and is returned to the caller.
    #[instrument(skip_all, fields(channel = %self.id()))]
    pub async fn initialize(&self) -> Result<(), ChannelError> {
        let _guard = self.inner.exclusive.lock().await;
        match self.lifecycle() {
            Lifecycle::Ready => return Ok(()),
            Lifecycle::Destroyed => {
                return Err(self.inner.lifecycle_error("initialize", Lifecycle::Destroyed))
            }
            Lifecycle::Created => {}
        }
        let inner = &self.inner;
        let page = match inner.provider.acquire(inner.profile.id.as_str()).await {
            Ok(page) => page,
            Err(err) => {
                let err = ChannelError::from_browser(&inner.profile.id, err);
                inner.fail(&err);
                return Err(err);
            }
        };
        if let Err(err) = inner.auth.initialize(Arc::clone(&page)).await {
            if let Err(release) = inner.provider.release(inner.profile.id.as_str()).await {
                warn!(error = %release, "page release after failed initialization");
            }
            inner.fail(&err);
            return Err(err);
        }

        *inner.page.write() = Some(page);
        *inner.lifecycle.lock() = Lifecycle::Ready;
        inner.update_status(|status| status.connected = true);
        inner.emit(EventPayload::Connected);
        info!("channel session initialized");
        Ok(())
    }

    /// Release the page and reset status. Terminal and idempotent; in-flight
    /// sends and streams are cancelled.
    #[instrument(skip_all, fields(channel = %self.id()))]
    pub async fn destroy(&self) {
        let inner = &self.inner;
        let previous = std::mem::replace(&mut *inner.lifecycle.lock(), Lifecycle::Destroyed);
        inner.shutdown.cancel();
        if previous == Lifecycle::Destroyed {
            debug!("session already destroyed");
            return;
        }

        let page = inner.page.write().take();
        inner.auth.cleanup().await;
        if page.is_some() {
            if let Err(err) = inner.provider.release(inner.profile.id.as_str()).await {
                warn!(error = %err, "page release failed during destroy");
            }
        }
        inner.update_status(|status| *status = ChannelStatus::disconnected());
        inner.emit(EventPayload::Disconnected);
        info!("channel session destroyed");
    }

    /// Ask the auth provider, refreshing `status.authenticated`. Always
    /// `false` before `initialize` and after `destroy`.
    pub async fn is_authenticated(&self) -> bool {
        if self.lifecycle() != Lifecycle::Ready {
            return false;
        }
        let _guard = self.inner.exclusive.lock().await;
        self.inner.check_auth().await
    }

    #[instrument(skip_all, fields(channel = %self.id()))]
    pub async fn authenticate(&self) -> Result<AuthResult, ChannelError> {
        let inner = &self.inner;
        inner.ready_page("authenticate")?;
        let _guard = inner.exclusive.lock().await;
        let result = inner.auth.authenticate().await;
        inner.update_status(|status| status.authenticated = result.success);
        if result.success {
            inner.emit(EventPayload::Authenticated);
        } else {
            inner.emit(EventPayload::Unauthenticated {
                error: result.error.clone(),
            });
        }
        Ok(result)
    }

    #[instrument(skip_all, fields(channel = %self.id()))]
    pub async fn logout(&self) -> Result<(), ChannelError> {
        let inner = &self.inner;
        inner.ready_page("log out")?;
        let _guard = inner.exclusive.lock().await;
        if let Err(err) = inner.auth.logout().await {
            inner.fail(&err);
            return Err(err);
        }
        inner.update_status(|status| status.authenticated = false);
        inner.emit(EventPayload::Unauthenticated { error: None });
        Ok(())
    }

    /// Send `text` (plus the rendered code context, if any) and wait for the
    /// settled reply.
    #[instrument(skip_all, fields(channel = %self.id(), len = text.chars().count()))]
    pub async fn send_message(
        &self,
        text: &str,
        context: Option<&ChatContext>,
    ) -> Result<String, ChannelError> {
        let inner = &self.inner;
        let _guard = inner.exclusive.lock().await;
        // A destroyed session's children start cancelled; report the state instead.
        if let Err(err) = inner.ready_page("send a message") {
            inner.fail(&err);
            return Err(err);
        }
        let cancel = inner.shutdown.child_token();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChannelError::Cancelled {
                channel: inner.profile.id.clone(),
            }),
            outcome = inner.send_blocking(text, context, &cancel) => outcome,
        };
        if let Err(err) = &outcome {
            inner.fail(err);
        }
        outcome
    }

    /// Send `text` and stream the reply as it grows. Nothing happens until
    /// the returned stream is first polled; precondition failures (including
    /// `NotAuthenticated`) are its first item.
    pub fn send_message_stream(
        &self,
        text: impl Into<String>,
        context: Option<ChatContext>,
    ) -> ReplyFragments {
        let stop = self.inner.shutdown.child_token();
        let settled = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&self.inner);
        let text = text.into();
        let token = stop.clone();
        let flag = Arc::clone(&settled);
        let opened = async move {
            match SessionInner::open_stream(Arc::clone(&inner), text, context, token, flag).await {
                Ok(replies) => Ok(replies.boxed()),
                // Stopped before anything was sent.
                Err(ChannelError::Cancelled { .. }) => Ok(stream::empty().boxed()),
                Err(err) => {
                    inner.fail(&err);
                    Err(err)
                }
            }
        };
        ReplyFragments {
            channel: self.id().clone(),
            inner: stream::once(opened).try_flatten().boxed(),
            stop,
            settled,
            started: false,
        }
    }

    /// Snapshot of the current status.
    pub fn get_status(&self) -> ChannelStatus {
        self.inner.status.lock().clone()
    }

    /// Call `handler` for this channel's events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let channel = self.id().clone();
        self.inner.hub.subscribe(kind, move |event| {
            if event.channel == channel {
                handler(event)
            }
        })
    }

    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let channel = self.id().clone();
        self.inner.hub.subscribe_all(move |event| {
            if event.channel == channel {
                handler(event)
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.hub.unsubscribe(id)
    }

    /// Receiver for every event on the shared hub, not only this channel's.
    pub fn watch(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.hub.watch()
    }
}

impl SessionInner {
    /// The only place status changes; always publishes `StatusChanged`.
    fn update_status(&self, mutate: impl FnOnce(&mut ChannelStatus)) {
        let snapshot = {
            let mut status = self.status.lock();
            mutate(&mut status);
            status.clone()
        };
        self.emit(EventPayload::StatusChanged { status: snapshot });
    }

    fn emit(&self, payload: EventPayload) {
        self.hub
            .publish(ChannelEvent::new(self.profile.id.clone(), payload));
    }

    fn fail(&self, err: &ChannelError) {
        if matches!(err, ChannelError::Cancelled { .. }) {
            debug!(channel = %self.profile.id, "operation cancelled");
            return;
        }
        error!(channel = %self.profile.id, code = err.code(), error = %err, "channel operation failed");
        let message = err.to_string();
        self.update_status(|status| status.last_error = Some(message.clone()));
        self.emit(EventPayload::Error { error: message });
    }

    fn lifecycle_error(&self, operation: &'static str, state: Lifecycle) -> ChannelError {
        ChannelError::SessionLifecycle {
            channel: self.profile.id.clone(),
            operation,
            state,
        }
    }

    fn ready_page(&self, operation: &'static str) -> Result<Arc<dyn PageHandle>, ChannelError> {
        let state = *self.lifecycle.lock();
        match (state, self.page.read().clone()) {
            (Lifecycle::Ready, Some(page)) => Ok(page),
            (Lifecycle::Ready, None) => Err(self.lifecycle_error(operation, Lifecycle::Destroyed)),
            (state, _) => Err(self.lifecycle_error(operation, state)),
        }
    }

    async fn check_auth(&self) -> bool {
        let state = self.auth.check_auth_status().await;
        if let Some(err) = &state.error {
            debug!(channel = %self.profile.id, error = %err, "auth check reported an error");
        }
        self.update_status(|status| status.authenticated = state.is_authenticated);
        state.is_authenticated
    }

    /// Re-checked on every send, never cached.
    async fn require_auth(&self) -> Result<(), ChannelError> {
        if self.check_auth().await {
            Ok(())
        } else {
            Err(ChannelError::NotAuthenticated {
                channel: self.profile.id.clone(),
            })
        }
    }

    async fn send_blocking(
        &self,
        text: &str,
        context: Option<&ChatContext>,
        cancel: &CancellationToken,
    ) -> Result<String, ChannelError> {
        let page = self.ready_page("send a message")?;
        self.require_auth().await?;
        self.deliver(&page, text, context, cancel).await?;
        let sent_at = Instant::now();
        let reply = self
            .captor
            .wait_for_reply(
                &page,
                self.profile.candidates(Capability::ResponseContainer),
                self.profile.candidates(Capability::LoadingIndicator),
            )
            .await
            .map_err(|err| ChannelError::from_capture(&self.profile.id, err))?;
        self.record_reply(&reply, sent_at.elapsed());
        Ok(reply)
    }

    async fn open_stream(
        session: Arc<SessionInner>,
        text: String,
        context: Option<ChatContext>,
        stop: CancellationToken,
        settled: Arc<AtomicBool>,
    ) -> Result<SessionReplyStream, ChannelError> {
        let guard = Arc::clone(&session.exclusive).lock_owned().await;
        let page = session.ready_page("stream a message")?;
        if stop.is_cancelled() {
            return Err(ChannelError::Cancelled {
                channel: session.profile.id.clone(),
            });
        }
        session.require_auth().await?;
        session
            .deliver(&page, &text, context.as_ref(), &stop)
            .await?;
        let replies = session.captor.stream_reply_with(
            &page,
            session.profile.candidates(Capability::ResponseContainer),
            session.profile.candidates(Capability::LoadingIndicator),
            stop.clone(),
        );
        Ok(SessionReplyStream {
            session,
            replies,
            stop,
            collected: String::new(),
            sent_at: Instant::now(),
            settled,
            guard: Some(guard),
        })
    }

    /// Navigate, focus the input, type, submit. Each step waits for the
    /// previous one to complete.
    async fn deliver(
        &self,
        page: &Arc<dyn PageHandle>,
        text: &str,
        context: Option<&ChatContext>,
        cancel: &CancellationToken,
    ) -> Result<(), ChannelError> {
        let channel = &self.profile.id;
        page.navigate(
            &self.profile.chat_url,
            WaitUntil::DocumentComplete,
            self.timeouts.navigation(),
        )
        .await
        .map_err(|err| ChannelError::from_browser(channel, err))?;

        let input = self
            .require(
                page,
                Capability::InputBox,
                Some(self.resolver.policy().input_budget()),
                cancel,
            )
            .await?;
        input
            .click()
            .await
            .map_err(|err| ChannelError::from_locator(channel, err))?;
        self.typing
            .type_message(page, text, context)
            .await
            .map_err(|err| ChannelError::from_typing(channel, err))?;
        self.submit(page, cancel).await?;

        self.emit(EventPayload::MessageSent {
            length: text.chars().count(),
        });
        Ok(())
    }

    async fn submit(
        &self,
        page: &Arc<dyn PageHandle>,
        cancel: &CancellationToken,
    ) -> Result<(), ChannelError> {
        let channel = &self.profile.id;
        let budget = self.resolver.policy().send_budget();
        let resolution = self
            .resolver
            .resolve_with(
                page,
                Capability::SendButton,
                self.profile.candidates(Capability::SendButton),
                Some(budget),
                Pick::First,
                Some(cancel),
            )
            .await;
        if matches!(resolution, Resolution::NotFound { .. }) && self.profile.submit_with_enter {
            debug!(channel = %channel, "no send button resolved, submitting with Enter");
            return page
                .press_key(&KeyInput::named("Enter"))
                .await
                .map_err(|err| ChannelError::from_browser(channel, err));
        }
        let button = resolution
            .required()
            .map_err(|err| self.capability_error(err))?;
        button
            .click()
            .await
            .map_err(|err| ChannelError::from_locator(channel, err))
    }

    async fn require(
        &self,
        page: &Arc<dyn PageHandle>,
        capability: Capability,
        budget: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ResolvedElement, ChannelError> {
        self.resolver
            .resolve_with(
                page,
                capability,
                self.profile.candidates(capability),
                budget,
                Pick::First,
                Some(cancel),
            )
            .await
            .required()
            .map_err(|err| self.capability_error(err))
    }

    /// Log a capability-level miss with its diagnostics, then convert it.
    fn capability_error(&self, err: LocatorError) -> ChannelError {
        if let LocatorError::NotFound {
            capability,
            candidates,
            sweeps,
            elapsed_ms,
        } = &err
        {
            warn!(
                channel = %self.profile.id,
                capability = %capability,
                candidates,
                sweeps,
                elapsed_ms,
                "required element not found"
            );
        }
        ChannelError::from_locator(&self.profile.id, err)
    }

    fn record_reply(&self, reply: &str, latency: Duration) {
        let response_time_ms = latency.as_millis() as u64;
        self.update_status(|status| {
            status.last_activity = Some(Utc::now());
            status.response_time_ms = Some(response_time_ms);
            status.last_error = None;
        });
        let length = reply.chars().count();
        self.emit(EventPayload::MessageReceived {
            length,
            response_time_ms,
        });
        info!(channel = %self.profile.id, length, response_time_ms, "reply received");
    }
}

/// Reply fragments of one streamed send; holds the session until it ends.
struct SessionReplyStream {
    session: Arc<SessionInner>,
    replies: ReplyStream,
    stop: CancellationToken,
    collected: String,
    sent_at: Instant,
    settled: Arc<AtomicBool>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Stream for SessionReplyStream {
    type Item = Result<String, ChannelError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.guard.is_none() {
            return Poll::Ready(None);
        }
        match this.replies.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(fragment))) => {
                this.collected.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.guard = None;
                let err = ChannelError::from_capture(&this.session.profile.id, err);
                this.session.fail(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.guard = None;
                if !this.stop.is_cancelled() {
                    this.settled.store(true, Ordering::SeqCst);
                    this.session
                        .record_reply(&this.collected, this.sent_at.elapsed());
                }
                Poll::Ready(None)
            }
        }
    }
}

/// Lazy stream of reply fragments returned by
/// [`ChannelSession::send_message_stream`].
///
/// After [`stop`](Self::stop) (or drop) the session issues no further page
/// queries for this send.
pub struct ReplyFragments {
    channel: ChannelId,
    inner: BoxStream<'static, Result<String, ChannelError>>,
    stop: CancellationToken,
    settled: Arc<AtomicBool>,
    started: bool,
}

impl ReplyFragments {
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// `true` once the reply settled and every fragment was handed out.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Concatenate every fragment; the first error aborts. A stream that
    /// ends without settling is `Cancelled`, never a partial reply.
    pub async fn collect_reply(mut self) -> Result<String, ChannelError> {
        let mut reply = String::new();
        while let Some(fragment) = self.next().await {
            reply.push_str(&fragment?);
        }
        if !self.is_settled() {
            return Err(ChannelError::Cancelled {
                channel: self.channel.clone(),
            });
        }
        Ok(reply)
    }
}

impl Stream for ReplyFragments {
    type Item = Result<String, ChannelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // The first poll always reaches the session so lifecycle errors surface.
        if self.started && self.stop.is_cancelled() {
            return Poll::Ready(None);
        }
        self.started = true;
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for ReplyFragments {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
