use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::EventFrameNavigated;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::ids::{ElementHandle, PageId};
use crate::input::KeyInput;
use crate::page::{PageHandle, WaitUntil};
use crate::provider::PageProvider;

const VISIBILITY_FN: &str = "function() { \
    const rect = this.getBoundingClientRect(); \
    const style = window.getComputedStyle(this); \
    return rect.width > 0 && rect.height > 0 \
        && style.visibility !== 'hidden' && style.display !== 'none'; \
}";

const SETTLE_QUIET: Duration = Duration::from_millis(500);

const TEXT_FN: &str = "function() { return this.innerText ?? this.textContent ?? ''; }";

/// A Chromium tab driven through `chromiumoxide`.
pub struct ChromiumPage {
    id: PageId,
    page: Page,
    epoch: Arc<AtomicU64>,
    next_element: AtomicU64,
    elements: Mutex<HashMap<u64, Slot>>,
    nav_listener: JoinHandle<()>,
}

/// Remote element plus the navigation epoch it was resolved in.
struct Slot {
    epoch: u64,
    element: Arc<Element>,
}

impl ChromiumPage {
    pub async fn attach(page: Page) -> Result<Self, AdapterError> {
        let epoch = Arc::new(AtomicU64::new(0));
        let mut navigations = page.event_listener::<EventFrameNavigated>().await?;
        let listener_epoch = Arc::clone(&epoch);
        let nav_listener = tokio::spawn(async move {
            while let Some(event) = navigations.next().await {
                if event.frame.parent_id.is_none() {
                    let epoch = listener_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(epoch, url = %event.frame.url, "main frame navigated");
                }
            }
        });
        Ok(Self {
            id: PageId::new(),
            page,
            epoch,
            next_element: AtomicU64::new(1),
            elements: Mutex::new(HashMap::new()),
            nav_listener,
        })
    }

    /// Re-querying a node already in the table reuses its handle id, so
    /// polling the same selector keeps one entry per DOM node.
    fn register(&self, selector: &str, element: Element) -> ElementHandle {
        let epoch = self.navigation_epoch();
        let mut elements = self.elements.lock();
        elements.retain(|_, slot| slot.epoch == epoch);
        let id = elements
            .iter()
            .find(|(_, slot)| slot.element.backend_node_id == element.backend_node_id)
            .map(|(id, _)| *id)
            .unwrap_or_else(|| self.next_element.fetch_add(1, Ordering::Relaxed));
        elements.insert(
            id,
            Slot {
                epoch,
                element: Arc::new(element),
            },
        );
        ElementHandle {
            page: self.id,
            id,
            epoch,
            selector: selector.to_string(),
        }
    }

    fn element(&self, handle: &ElementHandle) -> Result<Arc<Element>, AdapterError> {
        let current = self.navigation_epoch();
        let mut elements = self.elements.lock();
        // Handles from earlier documents are dropped lazily.
        elements.retain(|_, slot| slot.epoch == current);
        if handle.epoch != current {
            return Err(AdapterError::new(AdapterErrorKind::StaleElement)
                .with_hint(format!("{} (epoch {} != {})", handle.selector, handle.epoch, current)));
        }
        elements
            .get(&handle.id)
            .map(|slot| Arc::clone(&slot.element))
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::StaleElement).with_hint(handle.selector.clone())
            })
    }

    async fn find(&self, selector: &str) -> Result<Vec<Element>, AdapterError> {
        self.page
            .find_elements(selector)
            .await
            .map_err(|err| query_error(selector, err))
    }

    /// Poll `document.readyState` until `complete`, then stay quiet briefly
    /// so late scripts can attach their handlers.
    async fn wait_document_complete(&self) -> Result<(), CdpError> {
        loop {
            let state: String = self
                .page
                .evaluate("document.readyState")
                .await?
                .into_value()
                .unwrap_or_default();
            if state == "complete" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(SETTLE_QUIET).await;
        Ok(())
    }

    async fn dispatch(&self, key: &KeyInput, kind: DispatchKeyEventType) -> Result<(), AdapterError> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(key.key.clone())
            .modifiers(key.modifiers.bits() as i64);
        if !key.code.is_empty() {
            builder = builder.code(key.code.clone());
        }
        if let Some(vk) = key.windows_virtual_key_code {
            builder = builder.windows_virtual_key_code(vk);
        }
        if matches!(kind, DispatchKeyEventType::KeyDown) {
            if let Some(text) = &key.text {
                builder = builder.text(text.clone());
            }
            if !key.commands.is_empty() {
                builder = builder.commands(key.commands.clone());
            }
        }
        let params = builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(format!("key event: {err}"))
        })?;
        self.page.execute(params).await?;
        Ok(())
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.nav_listener.abort();
    }
}

fn query_error(selector: &str, err: CdpError) -> AdapterError {
    match err {
        // querySelectorAll rejects malformed selectors with a protocol error.
        CdpError::Chrome(inner) => AdapterError::new(AdapterErrorKind::InvalidSelector)
            .with_hint(format!("{selector}: {}", inner.message)),
        other => AdapterError::from(other),
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    fn page_id(&self) -> PageId {
        self.id
    }

    fn navigation_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    async fn navigate(
        &self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        info!(page = %self.id, url, ?wait, "navigating");
        let load = async {
            self.page.goto(url).await?;
            if wait == WaitUntil::DocumentComplete {
                self.wait_document_complete().await?;
            }
            Ok::<_, CdpError>(())
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(AdapterError::from(err).with_hint(url.to_string())),
            Err(_) => {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!("{url} after {}ms", timeout.as_millis()))
                    .retriable(true))
            }
        }
        // The frame listener may lag behind goto; bump here so handles from
        // the old document are rejected immediately.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.elements.lock().clear();
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError> {
        let mut found = self.find(selector).await?;
        if found.is_empty() {
            return Ok(None);
        }
        let first = found.swap_remove(0);
        Ok(Some(self.register(selector, first)))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        let found = self.find(selector).await?;
        Ok(found
            .into_iter()
            .map(|element| self.register(selector, element))
            .collect())
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        let node = self.element(element)?;
        let returns = node.call_js_fn(TEXT_FN, false).await?;
        Ok(returns
            .result
            .value
            .as_ref()
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, AdapterError> {
        let node = self.element(element)?;
        let returns = node.call_js_fn(VISIBILITY_FN, false).await?;
        Ok(returns
            .result
            .value
            .as_ref()
            .and_then(|value| value.as_bool())
            .unwrap_or(false))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        let node = self.element(element)?;
        node.click().await?;
        Ok(())
    }

    async fn press_key(&self, key: &KeyInput) -> Result<(), AdapterError> {
        self.dispatch(key, DispatchKeyEventType::KeyDown).await?;
        self.dispatch(key, DispatchKeyEventType::KeyUp).await
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.nav_listener.abort();
        self.elements.lock().clear();
        self.page.clone().close().await?;
        Ok(())
    }
}

struct HostState {
    browser: Browser,
    handler: JoinHandle<()>,
    pages: HashMap<String, Arc<ChromiumPage>>,
}

/// Lazily launched Chromium process that owns one tab per session.
pub struct ChromiumHost {
    config: CdpConfig,
    state: tokio::sync::Mutex<Option<HostState>>,
}

impl ChromiumHost {
    pub fn new(config: CdpConfig) -> Self {
        Self {
            config,
            state: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.config
    }

    async fn launch(&self) -> Result<HostState, AdapterError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&self.config.user_data_dir)
            .window_size(self.config.window_width, self.config.window_height)
            .args(self.config.args.clone());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = self.config.resolve_executable() {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err)
        })?;

        info!(
            headless = self.config.headless,
            profile = %self.config.user_data_dir.display(),
            "launching chromium"
        );
        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err.to_string())
        })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler event error");
                }
            }
        });
        Ok(HostState {
            browser,
            handler,
            pages: HashMap::new(),
        })
    }

    /// Close every page and the browser process.
    pub async fn shutdown(&self) {
        let Some(mut state) = self.state.lock().await.take() else {
            return;
        };
        for (owner, page) in state.pages.drain() {
            if let Err(err) = page.close().await {
                warn!(owner = %owner, error = %err, "closing page failed during shutdown");
            }
        }
        if let Err(err) = state.browser.close().await {
            warn!(error = %err, "closing browser failed");
        }
        state.handler.abort();
        info!("chromium shut down");
    }
}

#[async_trait]
impl PageProvider for ChromiumHost {
    async fn acquire(&self, owner: &str) -> Result<Arc<dyn PageHandle>, AdapterError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let state = guard
            .as_mut()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::Internal).with_hint("host state"))?;
        if let Some(existing) = state.pages.get(owner) {
            return Ok(Arc::clone(existing) as Arc<dyn PageHandle>);
        }
        let page = state.browser.new_page("about:blank").await?;
        let page = Arc::new(ChromiumPage::attach(page).await?);
        debug!(owner, page = %page.id, "page opened");
        state.pages.insert(owner.to_string(), Arc::clone(&page));
        Ok(page as Arc<dyn PageHandle>)
    }

    async fn release(&self, owner: &str) -> Result<(), AdapterError> {
        let page = match self.state.lock().await.as_mut() {
            Some(state) => state.pages.remove(owner),
            None => None,
        };
        if let Some(page) = page {
            page.close().await?;
            debug!(owner, "page released");
        }
        Ok(())
    }
}
