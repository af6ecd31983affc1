//! Page-level browser access for ChatRelay.
//!
//! Higher layers talk to a [`PageHandle`]: query elements by CSS selector,
//! read their text and visibility, click them and dispatch key events. The
//! Chromium implementation drives a real browser through `chromiumoxide`;
//! the `mock` feature exposes a scripted page for deterministic tests.

pub mod chromium;
pub mod config;
pub mod error;
pub mod ids;
pub mod input;
pub mod page;
pub mod provider;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use chromium::{ChromiumHost, ChromiumPage};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use ids::{ElementHandle, PageId};
pub use input::{KeyInput, Modifiers};
pub use page::{PageHandle, WaitUntil};
pub use provider::PageProvider;
