//! Sessions and their message logs.
//!
//! A [`Session`] owns an ordered sequence of [`Message`] records. While a
//! response is streaming in, exactly one assistant message carries
//! `streaming = true`; its content only ever grows until the flag is
//! cleared. Error classification is derived from a content-prefix marker
//! rather than stored, so a persisted transcript needs no extra field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, SessionId};

/// Prefix that classifies an assistant message as an error bubble.
pub const ERROR_MARKER: &str = "⚠️";

/// Fixed in-band text written into the placeholder when a stream fails.
pub const ERROR_REPLY: &str = "⚠️ An error occurred while generating the response.";

/// Greeting shown in a freshly created session.
pub const GREETING: &str = "Hello! Upload a document and ask me questions about it.";

/// Placeholder title for a session that has not been named yet.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human asking questions.
    User,
    /// The remote answer-generation service.
    Assistant,
}

/// A single entry in a session's message log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable identity, captured at creation and never reused.
    pub id: MessageId,
    /// Author role. Never changes after creation.
    pub role: Role,
    /// Message text. Append-only while `streaming` is set.
    pub content: String,
    /// True while this message is being filled by an in-flight stream.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
}

impl Message {
    /// Create a completed user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            streaming: false,
        }
    }

    /// Create a completed assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: content.into(),
            streaming: false,
        }
    }

    /// Create the empty streaming placeholder an exchange starts with.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
        }
    }

    /// Whether this message should render as an error bubble.
    ///
    /// Derived, not stored: the orchestrator writes [`ERROR_REPLY`] into a
    /// failed placeholder, and presentation keys off the prefix.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.role == Role::Assistant && self.content.starts_with(ERROR_MARKER)
    }
}

/// A chat session: identity, title, and the ordered message log.
///
/// Timestamps are owned by the remote store and mirrored read-only here;
/// they are `None` for sessions created locally that the store has not
/// acknowledged yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque unique identity.
    pub id: SessionId,
    /// Display title; starts as [`DEFAULT_TITLE`] until renamed or
    /// auto-generated.
    pub title: String,
    /// Ordered message log.
    pub messages: Vec<Message>,
    /// Creation time, mirrored from the remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last-update time, mirrored from the remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh local session with the greeting message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            title: DEFAULT_TITLE.to_owned(),
            messages: vec![Message::assistant(GREETING)],
            created_at: None,
            updated_at: None,
        }
    }

    /// Look up a message by id.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Number of messages currently marked streaming.
    #[must_use]
    pub fn streaming_count(&self) -> usize {
        self.messages.iter().filter(|m| m.streaming).count()
    }

    /// Whether the session holds nothing but the greeting.
    #[must_use]
    pub fn is_empty_conversation(&self) -> bool {
        self.messages.len() == 1 && self.messages[0].role == Role::Assistant
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
