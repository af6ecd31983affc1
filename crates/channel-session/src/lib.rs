//! Channel sessions: one authenticated chat page per web assistant.
//!
//! A [`ChannelSession`] composes element resolution, typing and reply
//! capture into `send_message` and `send_message_stream`, owns the
//! channel's status record and publishes the channel event taxonomy.

pub mod auth;
pub mod errors;
pub mod profile;
pub mod registry;
pub mod session;
pub mod settings;

pub use auth::{AuthProvider, AuthResult, AuthState, DomAuthProvider};
pub use errors::{ChannelError, Lifecycle};
pub use profile::ChannelProfile;
pub use registry::{ChannelRegistry, ChannelSummary};
pub use session::{ChannelSession, ReplyFragments};
pub use settings::{SessionSettings, SessionTimeouts};
