use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::page::PageHandle;

/// Hands out one page per owner (a channel session) and takes it back.
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn acquire(&self, owner: &str) -> Result<Arc<dyn PageHandle>, AdapterError>;

    async fn release(&self, owner: &str) -> Result<(), AdapterError>;
}
