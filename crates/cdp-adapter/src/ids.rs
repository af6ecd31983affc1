use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a page/tab.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an element on a page, valid only while the page stays on
/// the navigation epoch it was resolved in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementHandle {
    pub page: PageId,
    pub id: u64,
    pub epoch: u64,
    pub selector: String,
}
