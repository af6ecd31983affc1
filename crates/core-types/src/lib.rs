//! Shared vocabulary for the ChatRelay crates: channel identity, the
//! optional code context attached to outbound messages, the per-channel
//! status record and the closed set of channel events.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelIdError {
    #[error("channel id is empty")]
    Empty,
    #[error("channel id '{0}' may only contain lowercase ascii letters, digits, '-' and '_'")]
    InvalidCharacters(String),
}

/// Stable identifier of a web chat integration (e.g. `doubao`).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(try_from = "String", into = "String"))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ChannelIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ChannelIdError::Empty);
        }
        let valid = raw
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
        if !valid {
            return Err(ChannelIdError::InvalidCharacters(raw));
        }
        Ok(Self(raw))
    }

    /// For ids baked into the binary. Panics in debug builds on an invalid id.
    pub fn from_static(raw: &'static str) -> Self {
        debug_assert!(Self::parse(raw).is_ok(), "invalid built-in channel id {raw}");
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ChannelIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cursor location inside the file the context was taken from.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CursorPosition {
    pub line: u32,
    pub character: u32,
}

/// Optional editor context typed after the primary message.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChatContext {
    pub selected_code: Option<String>,
    pub current_file: Option<String>,
    pub language: Option<String>,
    pub cursor_position: Option<CursorPosition>,
}

impl ChatContext {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            selected_code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.current_file = Some(file.into());
        self
    }

    pub fn cursor(mut self, line: u32, character: u32) -> Self {
        self.cursor_position = Some(CursorPosition { line, character });
        self
    }

    /// True when there is code to append to the message.
    pub fn has_code(&self) -> bool {
        self.selected_code
            .as_deref()
            .map(|code| !code.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Connection and authentication state of one channel session.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    pub connected: bool,
    pub authenticated: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub response_time_ms: Option<u64>,
}

impl ChannelStatus {
    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// Discriminant of [`EventPayload`], used to filter subscriptions.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "kebab-case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Authenticated,
    Unauthenticated,
    MessageSent,
    MessageReceived,
    Error,
    StatusChanged,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Authenticated => "authenticated",
            EventKind::Unauthenticated => "unauthenticated",
            EventKind::MessageSent => "message-sent",
            EventKind::MessageReceived => "message-received",
            EventKind::Error => "error",
            EventKind::StatusChanged => "status-changed",
        }
    }

    pub fn all() -> [EventKind; 8] {
        [
            EventKind::Connected,
            EventKind::Disconnected,
            EventKind::Authenticated,
            EventKind::Unauthenticated,
            EventKind::MessageSent,
            EventKind::MessageReceived,
            EventKind::Error,
            EventKind::StatusChanged,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde-full",
    serde(tag = "type", rename_all = "kebab-case")
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    Connected,
    Disconnected,
    Authenticated,
    Unauthenticated { error: Option<String> },
    MessageSent { length: usize },
    MessageReceived { length: usize, response_time_ms: u64 },
    Error { error: String },
    StatusChanged { status: ChannelStatus },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Connected => EventKind::Connected,
            EventPayload::Disconnected => EventKind::Disconnected,
            EventPayload::Authenticated => EventKind::Authenticated,
            EventPayload::Unauthenticated { .. } => EventKind::Unauthenticated,
            EventPayload::MessageSent { .. } => EventKind::MessageSent,
            EventPayload::MessageReceived { .. } => EventKind::MessageReceived,
            EventPayload::Error { .. } => EventKind::Error,
            EventPayload::StatusChanged { .. } => EventKind::StatusChanged,
        }
    }
}

/// Notification emitted by a channel session.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEvent {
    pub channel: ChannelId,
    pub at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl ChannelEvent {
    pub fn new(channel: ChannelId, payload: EventPayload) -> Self {
        Self {
            channel,
            at: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_rejects_uppercase_and_empty() {
        assert_eq!(ChannelId::parse(""), Err(ChannelIdError::Empty));
        assert!(matches!(
            ChannelId::parse("Doubao"),
            Err(ChannelIdError::InvalidCharacters(_))
        ));
        assert_eq!(ChannelId::parse("dou-bao_2").unwrap().as_str(), "dou-bao_2");
    }

    #[test]
    fn payload_kind_matches_taxonomy_names() {
        let payload = EventPayload::MessageReceived {
            length: 3,
            response_time_ms: 10,
        };
        assert_eq!(payload.kind(), EventKind::MessageReceived);
        assert_eq!(payload.kind().name(), "message-received");
        assert_eq!(EventKind::all().len(), 8);
    }

    #[test]
    fn context_without_code_is_not_appended() {
        assert!(!ChatContext::default().has_code());
        assert!(!ChatContext::with_code("   ").has_code());
        assert!(ChatContext::with_code("fn main() {}").language("rust").has_code());
    }
}
