//! Element resolver with fallback chain orchestration

use std::sync::Arc;

use cdp_adapter::{AdapterError, AdapterErrorKind, ElementHandle, PageHandle};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::types::{Capability, LocatorCandidate, Resolution, ResolvedElement};

/// Timing knobs for resolution sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverPolicy {
    /// Pause between two sweeps over the whole candidate list.
    pub sweep_interval_ms: u64,
    /// How long to wait for the input box to appear.
    pub input_budget_ms: u64,
    /// How long to wait for a send button before falling back.
    pub send_budget_ms: u64,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 500,
            input_budget_ms: 5_000,
            send_budget_ms: 0,
        }
    }
}

impl ResolverPolicy {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn input_budget(&self) -> Duration {
        Duration::from_millis(self.input_budget_ms)
    }

    pub fn send_budget(&self) -> Duration {
        Duration::from_millis(self.send_budget_ms)
    }
}

/// Which of several elements matched by one selector to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    First,
    /// Newest reply bubbles are appended last.
    Last,
}

/// Resolves a capability to a live element by trying candidates in order.
#[derive(Debug, Clone, Default)]
pub struct SelectorResolver {
    policy: ResolverPolicy,
}

impl SelectorResolver {
    pub fn new(policy: ResolverPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    /// First element of the first matching candidate. Without a budget a
    /// single sweep is made.
    pub async fn resolve(
        &self,
        page: &Arc<dyn PageHandle>,
        capability: Capability,
        candidates: &[LocatorCandidate],
        budget: Option<Duration>,
    ) -> Resolution {
        self.resolve_with(page, capability, candidates, budget, Pick::First, None)
            .await
    }

    /// Last element of the first matching candidate.
    pub async fn resolve_last(
        &self,
        page: &Arc<dyn PageHandle>,
        capability: Capability,
        candidates: &[LocatorCandidate],
        budget: Option<Duration>,
    ) -> Resolution {
        self.resolve_with(page, capability, candidates, budget, Pick::Last, None)
            .await
    }

    /// Sweep `candidates` until a match, the budget elapses, or `cancel`
    /// fires. A cancelled resolution issues no further page queries.
    #[instrument(skip_all, fields(capability = %capability, candidates = candidates.len()))]
    pub async fn resolve_with(
        &self,
        page: &Arc<dyn PageHandle>,
        capability: Capability,
        candidates: &[LocatorCandidate],
        budget: Option<Duration>,
        pick: Pick,
        cancel: Option<&CancellationToken>,
    ) -> Resolution {
        let started = Instant::now();
        let deadline = budget.map(|budget| started + budget);
        let mut sweeps = 0u32;

        loop {
            sweeps += 1;
            if let Some(found) = self.sweep(page, capability, candidates, pick, cancel).await {
                debug!(
                    selector = %found.matched_selector,
                    priority = found.priority,
                    sweeps,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "capability resolved"
                );
                return Resolution::Found(found);
            }
            if is_cancelled(cancel) {
                return Resolution::Cancelled(capability);
            }

            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now < deadline => deadline - now,
                _ => break,
            };
            let pause = self.policy.sweep_interval().min(remaining);
            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Resolution::Cancelled(capability),
                        _ = page.sleep(pause) => {}
                    }
                }
                None => page.sleep(pause).await,
            }
        }

        let elapsed = started.elapsed();
        debug!(
            sweeps,
            elapsed_ms = elapsed.as_millis() as u64,
            "no candidate matched"
        );
        Resolution::NotFound {
            capability,
            candidates: candidates.len(),
            sweeps,
            elapsed,
        }
    }

    /// One pass over the list in priority order. Failing candidates are
    /// logged and skipped; the first match wins.
    pub async fn sweep(
        &self,
        page: &Arc<dyn PageHandle>,
        capability: Capability,
        candidates: &[LocatorCandidate],
        pick: Pick,
        cancel: Option<&CancellationToken>,
    ) -> Option<ResolvedElement> {
        for candidate in candidates {
            if is_cancelled(cancel) {
                return None;
            }
            match query_candidate(page.as_ref(), candidate, pick).await {
                Ok(Some(handle)) => {
                    return Some(ResolvedElement::new(
                        capability,
                        candidate,
                        handle,
                        Arc::clone(page),
                    ));
                }
                Ok(None) => {}
                Err(err) if err.is_invalid_selector() => {
                    debug!(selector = %candidate.selector, error = %err, "candidate rejected by page");
                }
                Err(err) => {
                    warn!(
                        capability = %capability,
                        selector = %candidate.selector,
                        error = %err,
                        "candidate query failed"
                    );
                }
            }
        }
        None
    }
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.map_or(false, CancellationToken::is_cancelled)
}

async fn query_candidate(
    page: &dyn PageHandle,
    candidate: &LocatorCandidate,
    pick: Pick,
) -> Result<Option<ElementHandle>, AdapterError> {
    let query = async {
        match pick {
            Pick::First => page.query(&candidate.selector).await,
            Pick::Last => Ok(page.query_all(&candidate.selector).await?.pop()),
        }
    };
    match candidate.wait_time_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), query)
            .await
            .unwrap_or_else(|_| {
                Err(AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("query exceeded {ms}ms"))
                    .retriable(true))
            }),
        None => query.await,
    }
}
