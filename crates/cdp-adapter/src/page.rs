use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::ids::{ElementHandle, PageId};
use crate::input::KeyInput;

/// Condition `navigate` waits for before returning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// `document.readyState` is `complete`, followed by a short quiet window.
    /// Requests started after that point are not awaited.
    #[default]
    DocumentComplete,
}

/// One browser tab as seen by the layers above the adapter.
///
/// Element handles carry the navigation epoch they were resolved in; any
/// operation on a handle from an older epoch fails with
/// [`AdapterErrorKind::StaleElement`](crate::AdapterErrorKind::StaleElement).
#[async_trait]
pub trait PageHandle: Send + Sync {
    fn page_id(&self) -> PageId;

    /// Counter bumped on every main-frame navigation.
    fn navigation_epoch(&self) -> u64;

    async fn navigate(
        &self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    /// First element matching `selector`, if any.
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError>;

    /// All elements matching `selector` in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError>;

    async fn text_content(&self, element: &ElementHandle) -> Result<String, AdapterError>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, AdapterError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError>;

    /// Dispatch a key press to whatever currently has focus.
    async fn press_key(&self, key: &KeyInput) -> Result<(), AdapterError>;

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&self) -> Result<(), AdapterError>;
}
