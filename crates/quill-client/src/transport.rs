//! The transport seam between the runtime and the remote service.
//!
//! [`Transport`] is the full external surface from the runtime's point of
//! view: the chat stream, uploads, title generation, and the session CRUD
//! calls. The runtime only ever talks to this trait, so tests drive it with
//! an in-memory fake and production wires in [`crate::ApiClient`].

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use quill_core::ids::SessionId;
use quill_core::message::Role;

use crate::error::ClientResult;

/// Ordered sequence of decoded text fragments from one chat stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// Callback receiving a single file's 0–100 byte progress.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Request body for opening a chat stream.
///
/// All three fields are required; the runtime validates before calling so an
/// incomplete request is never sent.
#[derive(Clone, Debug, Serialize)]
pub struct ChatStreamRequest {
    /// Owning user.
    pub user_id: String,
    /// Target session.
    pub session_id: SessionId,
    /// The user's question.
    pub query: String,
}

/// A file queued for upload.
#[derive(Clone, Debug)]
pub struct UploadFile {
    /// Original filename, forwarded in the multipart form.
    pub name: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
}

impl UploadFile {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Session record as the remote store returns it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteSession {
    /// Store-assigned identity.
    pub id: SessionId,
    /// Current title.
    pub title: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last-update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Persisted message as the remote store returns it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Contract with the remote chat service.
///
/// Any method may fail independently; callers are responsible for keeping
/// local state consistent across failures.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a chat stream. Returns decoded fragments in delivery order.
    async fn stream_chat(&self, request: ChatStreamRequest) -> ClientResult<ChatStream>;

    /// Upload one document, reporting byte progress as 0–100.
    ///
    /// Resolves with the server's parsed JSON receipt on 2xx.
    async fn upload_document(
        &self,
        user_id: &str,
        session_id: SessionId,
        file: &UploadFile,
        progress: ProgressFn,
    ) -> ClientResult<serde_json::Value>;

    /// Ask the service to derive a title from the session's first exchange.
    async fn generate_title(&self, session_id: SessionId) -> ClientResult<String>;

    /// Create a session in the remote store.
    async fn create_session(&self, user_id: &str, title: &str) -> ClientResult<RemoteSession>;

    /// List all sessions belonging to a user.
    async fn list_sessions(&self, user_id: &str) -> ClientResult<Vec<RemoteSession>>;

    /// Fetch the persisted message log for a session.
    async fn fetch_messages(&self, session_id: SessionId) -> ClientResult<Vec<RemoteMessage>>;

    /// Rename a session.
    async fn update_title(&self, session_id: SessionId, title: &str) -> ClientResult<()>;

    /// Delete a session and its messages.
    async fn delete_session(&self, session_id: SessionId) -> ClientResult<()>;
}
