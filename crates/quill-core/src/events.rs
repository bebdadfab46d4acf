//! Events broadcast to presentation layers.
//!
//! [`ChatEvent`] is the runtime's outbound surface: every observable state
//! change (reveal units landing, messages reaching a terminal state, upload
//! progress, title updates) is mirrored as an event so a UI can re-render
//! from the store snapshot it already holds. Events are transient — never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, SessionId};

/// Common fields carried by every event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a base event stamped with the current UTC time.
    #[must_use]
    pub fn now(session_id: SessionId) -> Self {
        Self {
            session_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Observable runtime state changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    /// A reveal unit was appended to a streaming message.
    #[serde(rename = "message_update")]
    MessageUpdate {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Message receiving content.
        #[serde(rename = "messageId")]
        message_id: MessageId,
        /// The appended text unit (one character when paced, one fragment
        /// when immediate).
        delta: String,
    },

    /// A streaming message reached its terminal success state.
    #[serde(rename = "message_complete")]
    MessageComplete {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Message that finished.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// A streaming message reached its terminal failure state.
    #[serde(rename = "message_failed")]
    MessageFailed {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Message that failed.
        #[serde(rename = "messageId")]
        message_id: MessageId,
        /// Human-readable cause, for diagnostics only — the in-band error
        /// marker is what presentation renders.
        error: String,
    },

    /// A streaming message was cancelled; the revealed prefix stays, the
    /// rest of the stream is dropped.
    #[serde(rename = "message_cancelled")]
    MessageCancelled {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Message that was cancelled.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// Overall progress across an upload batch moved forward.
    #[serde(rename = "upload_progress")]
    UploadProgress {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Zero-based index of the file currently transferring.
        #[serde(rename = "fileIndex")]
        file_index: usize,
        /// Number of files in the batch.
        #[serde(rename = "fileCount")]
        file_count: usize,
        /// Monotonic overall percentage, 0–100.
        overall: u8,
    },

    /// Every file in an upload batch finished; the send gate is open.
    #[serde(rename = "upload_complete")]
    UploadComplete {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Number of files uploaded.
        #[serde(rename = "fileCount")]
        file_count: usize,
    },

    /// An upload batch aborted; remaining files were not attempted.
    #[serde(rename = "upload_failed")]
    UploadFailed {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Index of the file that failed.
        #[serde(rename = "fileIndex")]
        file_index: usize,
        /// Name of the file that failed.
        file: String,
        /// Failure description.
        error: String,
    },

    /// The session's title changed (rename or auto-generation).
    #[serde(rename = "title_updated")]
    TitleUpdated {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The new title.
        title: String,
    },
}

impl ChatEvent {
    /// The session this event belongs to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::MessageUpdate { base, .. }
            | Self::MessageComplete { base, .. }
            | Self::MessageFailed { base, .. }
            | Self::MessageCancelled { base, .. }
            | Self::UploadProgress { base, .. }
            | Self::UploadComplete { base, .. }
            | Self::UploadFailed { base, .. }
            | Self::TitleUpdated { base, .. } => base.session_id,
        }
    }

    /// Wire-format event type tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageUpdate { .. } => "message_update",
            Self::MessageComplete { .. } => "message_complete",
            Self::MessageFailed { .. } => "message_failed",
            Self::MessageCancelled { .. } => "message_cancelled",
            Self::UploadProgress { .. } => "upload_progress",
            Self::UploadComplete { .. } => "upload_complete",
            Self::UploadFailed { .. } => "upload_failed",
            Self::TitleUpdated { .. } => "title_updated",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
