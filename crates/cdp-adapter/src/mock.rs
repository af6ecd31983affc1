//! Scripted in-memory page for deterministic tests.
//!
//! Elements are registered per selector. Each element holds a text script
//! that advances one entry per read and then sticks on its last entry, which
//! is enough to model a reply that grows and then stops.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::ids::{ElementHandle, PageId};
use crate::input::{KeyInput, Modifiers};
use crate::page::{PageHandle, WaitUntil};
use crate::provider::PageProvider;

#[derive(Clone, Debug)]
struct ScriptedElement {
    texts: Vec<String>,
    cursor: usize,
    visible: bool,
}

impl ScriptedElement {
    fn new(texts: Vec<String>) -> Self {
        Self {
            texts,
            cursor: 0,
            visible: true,
        }
    }

    fn read(&mut self) -> String {
        let text = self
            .texts
            .get(self.cursor)
            .or_else(|| self.texts.last())
            .cloned()
            .unwrap_or_default();
        if self.cursor + 1 < self.texts.len() {
            self.cursor += 1;
        }
        text
    }
}

#[derive(Default)]
struct ScriptState {
    elements: HashMap<String, Vec<ScriptedElement>>,
    invalid: HashSet<String>,
    failing: HashSet<String>,
    handles: HashMap<u64, (String, usize)>,
    keys: Vec<KeyInput>,
    clicks: Vec<String>,
    navigations: Vec<String>,
    input: String,
    selection_all: bool,
    submitted: Vec<String>,
}

pub struct ScriptedPage {
    id: PageId,
    epoch: AtomicU64,
    next_handle: AtomicU64,
    queries: AtomicUsize,
    text_reads: AtomicUsize,
    closed: AtomicBool,
    state: Mutex<ScriptState>,
}

impl ScriptedPage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: PageId::new(),
            epoch: AtomicU64::new(0),
            next_handle: AtomicU64::new(1),
            queries: AtomicUsize::new(0),
            text_reads: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            state: Mutex::new(ScriptState::default()),
        })
    }

    /// Replace everything under `selector` with one element showing `text`.
    pub fn set_element(&self, selector: &str, text: &str) {
        self.script_text(selector, [text]);
    }

    /// Replace everything under `selector` with one element whose text
    /// follows `texts`, one entry per read.
    pub fn script_text<I, S>(&self, selector: &str, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let element = ScriptedElement::new(texts.into_iter().map(Into::into).collect());
        self.state
            .lock()
            .elements
            .insert(selector.to_string(), vec![element]);
    }

    /// Append another element after the existing matches of `selector`.
    pub fn push_element<I, S>(&self, selector: &str, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let element = ScriptedElement::new(texts.into_iter().map(Into::into).collect());
        self.state
            .lock()
            .elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
    }

    pub fn remove_element(&self, selector: &str) {
        self.state.lock().elements.remove(selector);
    }

    pub fn set_visible(&self, selector: &str, visible: bool) {
        if let Some(elements) = self.state.lock().elements.get_mut(selector) {
            for element in elements {
                element.visible = visible;
            }
        }
    }

    /// Queries for `selector` fail as a malformed selector would.
    pub fn mark_invalid(&self, selector: &str) {
        self.state.lock().invalid.insert(selector.to_string());
    }

    /// Queries for `selector` fail with a transport error.
    pub fn mark_failing(&self, selector: &str) {
        self.state.lock().failing.insert(selector.to_string());
    }

    /// Simulate a navigation that invalidates every outstanding handle.
    pub fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state.lock().handles.clear();
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn text_reads(&self) -> usize {
        self.text_reads.load(Ordering::SeqCst)
    }

    /// Page interactions (queries plus reads) observed so far.
    pub fn interactions(&self) -> usize {
        self.query_count() + self.text_reads()
    }

    pub fn keys(&self) -> Vec<KeyInput> {
        self.state.lock().keys.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    /// Current content of the simulated input field.
    pub fn input_value(&self) -> String {
        self.state.lock().input.clone()
    }

    /// Texts submitted with a bare Enter.
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::new(AdapterErrorKind::PageClosed));
        }
        Ok(())
    }

    fn lookup<'a>(
        &self,
        state: &'a mut ScriptState,
        handle: &ElementHandle,
    ) -> Result<&'a mut ScriptedElement, AdapterError> {
        let stale = || {
            AdapterError::new(AdapterErrorKind::StaleElement).with_hint(handle.selector.clone())
        };
        if handle.epoch != self.navigation_epoch() {
            return Err(stale());
        }
        let (selector, index) = state.handles.get(&handle.id).cloned().ok_or_else(stale)?;
        state
            .elements
            .get_mut(&selector)
            .and_then(|elements| elements.get_mut(index))
            .ok_or_else(stale)
    }

    fn matches(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        self.ensure_open()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.invalid.contains(selector) {
            return Err(AdapterError::new(AdapterErrorKind::InvalidSelector)
                .with_hint(selector.to_string()));
        }
        if state.failing.contains(selector) {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(selector.to_string())
                .retriable(true));
        }
        let count = state.elements.get(selector).map_or(0, Vec::len);
        let epoch = self.navigation_epoch();
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
            state.handles.insert(id, (selector.to_string(), index));
            handles.push(ElementHandle {
                page: self.id,
                id,
                epoch,
                selector: selector.to_string(),
            });
        }
        Ok(handles)
    }
}

#[async_trait]
impl PageHandle for ScriptedPage {
    fn page_id(&self) -> PageId {
        self.id
    }

    fn navigation_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    async fn navigate(
        &self,
        url: &str,
        _wait: WaitUntil,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.ensure_open()?;
        self.state.lock().navigations.push(url.to_string());
        self.bump_epoch();
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError> {
        Ok(self.matches(selector)?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        self.matches(selector)
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        self.ensure_open()?;
        self.text_reads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        Ok(self.lookup(&mut state, element)?.read())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, AdapterError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        Ok(self.lookup(&mut state, element)?.visible)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        self.lookup(&mut state, element)?;
        state.clicks.push(element.selector.clone());
        Ok(())
    }

    async fn press_key(&self, key: &KeyInput) -> Result<(), AdapterError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.keys.push(key.clone());
        if key.commands.iter().any(|cmd| cmd == "selectAll") {
            state.selection_all = true;
            return Ok(());
        }
        match key.key.as_str() {
            "Backspace" => {
                if std::mem::take(&mut state.selection_all) {
                    state.input.clear();
                } else {
                    state.input.pop();
                }
            }
            "Enter" if !key.modifiers.contains(Modifiers::SHIFT) => {
                state.selection_all = false;
                let text = std::mem::take(&mut state.input);
                state.submitted.push(text);
            }
            "Enter" => {
                state.selection_all = false;
                state.input.push('\n');
            }
            _ if key.is_plain_text() => {
                if std::mem::take(&mut state.selection_all) {
                    state.input.clear();
                }
                if let Some(text) = &key.text {
                    state.input.push_str(text);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider that always hands out the same scripted page.
pub struct MockProvider {
    page: Arc<ScriptedPage>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl MockProvider {
    pub fn new(page: Arc<ScriptedPage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        })
    }

    pub fn page(&self) -> Arc<ScriptedPage> {
        Arc::clone(&self.page)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageProvider for MockProvider {
    async fn acquire(&self, _owner: &str) -> Result<Arc<dyn PageHandle>, AdapterError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.page) as Arc<dyn PageHandle>)
    }

    async fn release(&self, _owner: &str) -> Result<(), AdapterError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.page.close().await
    }
}
