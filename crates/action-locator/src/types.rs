//! Core types for locator system

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cdp_adapter::{AdapterError, ElementHandle, PageHandle};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::errors::LocatorError;

/// UI role the automation needs on a chat page, independent of markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    InputBox,
    SendButton,
    ResponseContainer,
    LoadingIndicator,
    LoginIndicator,
    LogoutControl,
}

impl Capability {
    /// Get capability name as string
    pub fn name(&self) -> &'static str {
        match self {
            Capability::InputBox => "input_box",
            Capability::SendButton => "send_button",
            Capability::ResponseContainer => "response_container",
            Capability::LoadingIndicator => "loading_indicator",
            Capability::LoginIndicator => "login_indicator",
            Capability::LogoutControl => "logout_control",
        }
    }

    pub fn all() -> [Capability; 6] {
        [
            Capability::InputBox,
            Capability::SendButton,
            Capability::ResponseContainer,
            Capability::LoadingIndicator,
            Capability::LoginIndicator,
            Capability::LogoutControl,
        ]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One selector to try for a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorCandidate {
    /// Position in the candidate list; lower is tried first.
    #[serde(default)]
    pub priority: usize,
    pub selector: String,
    #[serde(default)]
    pub description: String,
    /// Upper bound for the single query issued for this candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time_ms: Option<u64>,
}

impl LocatorCandidate {
    pub fn new(selector: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            priority: 0,
            selector: selector.into(),
            description: description.into(),
            wait_time_ms: None,
        }
    }

    pub fn with_wait_time(mut self, ms: u64) -> Self {
        self.wait_time_ms = Some(ms);
        self
    }
}

/// Ordered candidate lists per capability. List position is the priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Capability, Vec<LocatorCandidate>>",
    into = "BTreeMap<Capability, Vec<LocatorCandidate>>"
)]
pub struct CandidateSet {
    lists: BTreeMap<Capability, Vec<LocatorCandidate>>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability, candidates: Vec<LocatorCandidate>) -> Self {
        self.set(capability, candidates);
        self
    }

    pub fn set(&mut self, capability: Capability, mut candidates: Vec<LocatorCandidate>) {
        for (index, candidate) in candidates.iter_mut().enumerate() {
            candidate.priority = index;
        }
        self.lists.insert(capability, candidates);
    }

    /// Candidates for `capability` in priority order; empty when unconfigured.
    pub fn get(&self, capability: Capability) -> &[LocatorCandidate] {
        self.lists
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_configured(&self, capability: Capability) -> bool {
        !self.get(capability).is_empty()
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.lists.keys().copied()
    }
}

impl From<BTreeMap<Capability, Vec<LocatorCandidate>>> for CandidateSet {
    fn from(lists: BTreeMap<Capability, Vec<LocatorCandidate>>) -> Self {
        let mut set = CandidateSet::new();
        for (capability, candidates) in lists {
            set.set(capability, candidates);
        }
        set
    }
}

impl From<CandidateSet> for BTreeMap<Capability, Vec<LocatorCandidate>> {
    fn from(set: CandidateSet) -> Self {
        set.lists
    }
}

/// Element found for a capability. Valid only for the document it was
/// resolved in; every accessor re-checks the page's navigation epoch.
#[derive(Clone)]
pub struct ResolvedElement {
    pub capability: Capability,
    pub matched_selector: String,
    pub priority: usize,
    pub handle: ElementHandle,
    pub resolved_at: Instant,
    page: Arc<dyn PageHandle>,
}

impl fmt::Debug for ResolvedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedElement")
            .field("capability", &self.capability)
            .field("matched_selector", &self.matched_selector)
            .field("priority", &self.priority)
            .field("handle", &self.handle)
            .finish()
    }
}

impl ResolvedElement {
    pub(crate) fn new(
        capability: Capability,
        candidate: &LocatorCandidate,
        handle: ElementHandle,
        page: Arc<dyn PageHandle>,
    ) -> Self {
        Self {
            capability,
            matched_selector: candidate.selector.clone(),
            priority: candidate.priority,
            handle,
            resolved_at: Instant::now(),
            page,
        }
    }

    pub fn age(&self) -> Duration {
        self.resolved_at.elapsed()
    }

    pub fn is_live(&self) -> bool {
        self.page.navigation_epoch() == self.handle.epoch
    }

    fn ensure_live(&self) -> Result<(), LocatorError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(self.stale())
        }
    }

    fn stale(&self) -> LocatorError {
        LocatorError::StaleElement {
            capability: self.capability,
            selector: self.matched_selector.clone(),
        }
    }

    fn map_page_error(&self, err: AdapterError) -> LocatorError {
        if err.is_stale() {
            self.stale()
        } else {
            LocatorError::Page(err)
        }
    }

    pub async fn text(&self) -> Result<String, LocatorError> {
        self.ensure_live()?;
        self.page
            .text_content(&self.handle)
            .await
            .map_err(|err| self.map_page_error(err))
    }

    pub async fn click(&self) -> Result<(), LocatorError> {
        self.ensure_live()?;
        self.page
            .click(&self.handle)
            .await
            .map_err(|err| self.map_page_error(err))
    }

    pub async fn is_visible(&self) -> Result<bool, LocatorError> {
        self.ensure_live()?;
        self.page
            .is_visible(&self.handle)
            .await
            .map_err(|err| self.map_page_error(err))
    }
}

/// Outcome of a resolution attempt. A miss is a value, not an error.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ResolvedElement),
    NotFound {
        capability: Capability,
        candidates: usize,
        sweeps: u32,
        elapsed: Duration,
    },
    Cancelled(Capability),
}

impl Resolution {
    pub fn found(self) -> Option<ResolvedElement> {
        match self {
            Resolution::Found(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    /// Turn a miss into [`LocatorError::NotFound`] for callers that need the element.
    pub fn required(self) -> Result<ResolvedElement, LocatorError> {
        match self {
            Resolution::Found(element) => Ok(element),
            Resolution::NotFound {
                capability,
                candidates,
                sweeps,
                elapsed,
            } => Err(LocatorError::NotFound {
                capability,
                candidates,
                sweeps,
                elapsed_ms: elapsed.as_millis() as u64,
            }),
            Resolution::Cancelled(capability) => Err(LocatorError::Cancelled(capability)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_priority_follows_list_position() {
        let set = CandidateSet::new().with(
            Capability::InputBox,
            vec![
                LocatorCandidate::new("textarea", "plain textarea"),
                LocatorCandidate::new("[contenteditable]", "rich editor"),
            ],
        );
        let priorities: Vec<usize> = set
            .get(Capability::InputBox)
            .iter()
            .map(|c| c.priority)
            .collect();
        assert_eq!(priorities, vec![0, 1]);
        assert!(set.get(Capability::SendButton).is_empty());
    }

    #[test]
    fn yaml_load_renumbers_priorities() {
        let raw = r#"
input_box:
  - selector: "textarea"
    priority: 7
  - selector: "[contenteditable]"
    description: rich editor
    wait_time_ms: 250
"#;
        let set: CandidateSet = serde_yaml::from_str(raw).unwrap();
        let list = set.get(Capability::InputBox);
        assert_eq!(list[0].priority, 0);
        assert_eq!(list[1].priority, 1);
        assert_eq!(list[1].wait_time_ms, Some(250));
    }

    #[test]
    fn capability_names_are_snake_case() {
        assert_eq!(Capability::ResponseContainer.to_string(), "response_container");
        assert_eq!(Capability::all().len(), 6);
    }
}
