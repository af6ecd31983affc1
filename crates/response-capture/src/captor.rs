use std::sync::Arc;

use action_locator::{
    Capability, LocatorCandidate, Pick, Resolution, ResolvedElement, ResolverPolicy,
    SelectorResolver,
};
use cdp_adapter::PageHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{CaptureConfig, PollCadence};
use crate::errors::CaptureError;
use crate::state::{CaptureState, TickOutcome};
use crate::stream::ReplyStream;

/// Discovers the reply container and watches it until the reply settles.
#[derive(Clone, Debug, Default)]
pub struct ResponseCaptor {
    config: CaptureConfig,
}

impl ResponseCaptor {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Wait for the newest reply to settle and return its trimmed text.
    #[instrument(skip_all, fields(candidates = replies.len()))]
    pub async fn wait_for_reply(
        &self,
        page: &Arc<dyn PageHandle>,
        replies: &[LocatorCandidate],
        loading: &[LocatorCandidate],
    ) -> Result<String, CaptureError> {
        let mut run = CaptureRun::new(
            &self.config,
            self.config.blocking,
            Arc::clone(page),
            replies.to_vec(),
            loading.to_vec(),
            CancellationToken::new(),
        );
        run.discover().await?;
        loop {
            if run.state.ticks() > 0 {
                run.pause().await?;
            }
            let (_, outcome) = run.tick().await?;
            if outcome == TickOutcome::Settled {
                return run.finish();
            }
            run.check_generation_cap()?;
        }
    }

    /// Stream forward-only fragments of the newest reply until it settles.
    /// Nothing touches the page until the stream is first polled.
    pub fn stream_reply(
        &self,
        page: &Arc<dyn PageHandle>,
        replies: &[LocatorCandidate],
        loading: &[LocatorCandidate],
    ) -> ReplyStream {
        self.stream_reply_with(page, replies, loading, CancellationToken::new())
    }

    /// Like [`stream_reply`](Self::stream_reply), stopped by `stop` as well.
    pub fn stream_reply_with(
        &self,
        page: &Arc<dyn PageHandle>,
        replies: &[LocatorCandidate],
        loading: &[LocatorCandidate],
        stop: CancellationToken,
    ) -> ReplyStream {
        let run = CaptureRun::new(
            &self.config,
            self.config.streaming,
            Arc::clone(page),
            replies.to_vec(),
            loading.to_vec(),
            stop.clone(),
        );
        ReplyStream::new(run, stop)
    }
}

/// One in-flight capture: page, candidates, state and the stop signal.
pub(crate) struct CaptureRun {
    pub(crate) state: CaptureState,
    cadence: PollCadence,
    resolver: SelectorResolver,
    page: Arc<dyn PageHandle>,
    replies: Vec<LocatorCandidate>,
    loading: Vec<LocatorCandidate>,
    element: Option<ResolvedElement>,
    pub(crate) stop: CancellationToken,
}

impl CaptureRun {
    pub(crate) fn new(
        config: &CaptureConfig,
        cadence: PollCadence,
        page: Arc<dyn PageHandle>,
        replies: Vec<LocatorCandidate>,
        loading: Vec<LocatorCandidate>,
        stop: CancellationToken,
    ) -> Self {
        let resolver = SelectorResolver::new(ResolverPolicy {
            sweep_interval_ms: cadence.discovery_interval_ms,
            ..ResolverPolicy::default()
        });
        Self {
            state: CaptureState::new(
                config.stable_ticks,
                config.discovery_timeout(),
                config.max_generation(),
            ),
            cadence,
            resolver,
            page,
            replies,
            loading,
            element: None,
            stop,
        }
    }

    pub(crate) fn is_discovered(&self) -> bool {
        self.element.is_some()
    }

    fn ensure_running(&self) -> Result<(), CaptureError> {
        if self.stop.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }
        Ok(())
    }

    /// AwaitingElement: sweep for the newest reply container until the
    /// discovery deadline.
    pub(crate) async fn discover(&mut self) -> Result<(), CaptureError> {
        self.ensure_running()?;
        let budget = self.state.discovery_remaining();
        let resolution = self
            .resolver
            .resolve_with(
                &self.page,
                Capability::ResponseContainer,
                &self.replies,
                Some(budget),
                Pick::Last,
                Some(&self.stop),
            )
            .await;
        match resolution {
            Resolution::Found(element) => {
                debug!(selector = %element.matched_selector, "reply container found");
                self.element = Some(element);
                self.state.enter_generating();
                Ok(())
            }
            Resolution::NotFound {
                candidates, sweeps, ..
            } => {
                self.state.mark_timed_out();
                let elapsed_ms = self.state.elapsed_ms();
                warn!(
                    capability = %Capability::ResponseContainer,
                    candidates,
                    sweeps,
                    elapsed_ms,
                    "reply container never appeared"
                );
                Err(CaptureError::DiscoveryTimeout {
                    elapsed_ms,
                    candidates,
                    sweeps,
                })
            }
            Resolution::Cancelled(_) => Err(CaptureError::Cancelled),
        }
    }

    /// Sleep one poll interval, waking early when stopped.
    pub(crate) async fn pause(&self) -> Result<(), CaptureError> {
        tokio::select! {
            _ = self.stop.cancelled() => Err(CaptureError::Cancelled),
            _ = self.page.sleep(self.cadence.poll_interval()) => Ok(()),
        }
    }

    /// Generating: one snapshot plus loading check, fed to the settle detector.
    pub(crate) async fn tick(&mut self) -> Result<(String, TickOutcome), CaptureError> {
        self.ensure_running()?;
        let element = self.element.as_ref().ok_or(CaptureError::Cancelled)?;
        let snapshot = element.text().await?;
        let loading = self.loading_visible().await;
        let outcome = self.state.observe(&snapshot, loading);
        if outcome == TickOutcome::Loading {
            debug!(tick = self.state.ticks(), "loading indicator visible");
        }
        Ok((snapshot, outcome))
    }

    async fn loading_visible(&self) -> bool {
        for candidate in &self.loading {
            if self.stop.is_cancelled() {
                return false;
            }
            let found = self
                .resolver
                .sweep(
                    &self.page,
                    Capability::LoadingIndicator,
                    std::slice::from_ref(candidate),
                    Pick::First,
                    Some(&self.stop),
                )
                .await;
            if let Some(indicator) = found {
                match indicator.is_visible().await {
                    Ok(true) => return true,
                    Ok(false) => {}
                    Err(err) => debug!(selector = %candidate.selector, error = %err, "loading check failed"),
                }
            }
        }
        false
    }

    pub(crate) fn check_generation_cap(&mut self) -> Result<(), CaptureError> {
        if self.state.generation_expired() {
            let err = CaptureError::SettleTimeout {
                elapsed_ms: self.state.generating_ms(),
                ticks: self.state.ticks(),
                last_len: self.state.last_snapshot().chars().count(),
            };
            warn!(
                capability = %Capability::ResponseContainer,
                candidates = self.replies.len(),
                elapsed_ms = self.state.elapsed_ms(),
                error = %err,
                "reply never settled"
            );
            return Err(err);
        }
        Ok(())
    }

    /// Settled: the trimmed final snapshot, or `EmptyReply`.
    pub(crate) fn finish(&self) -> Result<String, CaptureError> {
        let text = self.state.last_snapshot().trim();
        if text.is_empty() {
            warn!(ticks = self.state.ticks(), "reply settled empty");
            return Err(CaptureError::EmptyReply {
                ticks: self.state.ticks(),
            });
        }
        info!(
            ticks = self.state.ticks(),
            elapsed_ms = self.state.elapsed_ms(),
            len = text.chars().count(),
            "reply settled"
        );
        Ok(text.to_string())
    }
}
