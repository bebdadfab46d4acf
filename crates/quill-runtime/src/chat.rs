//! The orchestrator: one entry point per user intention.
//!
//! [`ChatRuntime`] owns the session store, the event emitter, the upload
//! coordinator, and the transport, and sequences every exchange: validate,
//! append the user message and streaming placeholder atomically, consume the
//! stream through a per-run [`RevealScheduler`], drive the message to exactly
//! one terminal state, then fire one-shot title generation when warranted.
//!
//! Precondition failures are not errors. An operation whose gate is closed
//! (blank input, upload in flight, no documents ready) is a no-op reported
//! through [`SendOutcome::Skipped`]; [`ChatError`] is reserved for work that
//! started and failed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use quill_client::{ChatStreamRequest, RemoteMessage, Transport, UploadFile};
use quill_core::events::{BaseEvent, ChatEvent};
use quill_core::ids::{MessageId, SessionId};
use quill_core::message::{DEFAULT_TITLE, ERROR_REPLY, Message, Role, Session};
use quill_settings::QuillSettings;

use crate::emitter::EventEmitter;
use crate::errors::{ChatError, RuntimeResult};
use crate::reveal::{RevealMode, RevealScheduler, RevealSink};
use crate::store::SessionStore;
use crate::upload::UploadCoordinator;

/// Runtime construction parameters.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Opaque user identity sent with chat and upload requests.
    pub user_id: String,
    /// How streamed content becomes visible.
    pub reveal: RevealMode,
    /// Minimum observable duration of an upload batch.
    pub min_visible: Duration,
}

impl RuntimeConfig {
    /// Derive a config from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &QuillSettings) -> Self {
        Self {
            user_id: settings.api.user_id.clone(),
            reveal: RevealMode::from_settings(&settings.reveal),
            min_visible: Duration::from_millis(settings.upload.min_visible_ms),
        }
    }
}

/// Why a send was refused without side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Input was empty after trimming.
    BlankInput,
    /// An upload batch is still transferring for this session.
    UploadInProgress,
    /// No successful upload batch yet; there is nothing to ask about.
    DocumentsNotReady,
    /// The session is not in the store.
    UnknownSession,
}

/// Terminal result of one send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The placeholder absorbed the full response.
    Completed {
        /// The assistant message that finished.
        message_id: MessageId,
    },
    /// The stream failed; the placeholder carries the in-band error reply.
    Failed {
        /// The assistant message that failed.
        message_id: MessageId,
    },
    /// The run was cancelled; revealed content stays, the rest is dropped.
    Cancelled {
        /// The assistant message that was cancelled.
        message_id: MessageId,
    },
    /// A precondition was not met; nothing changed.
    Skipped(SkipReason),
}

/// Result of a one-shot title generation attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TitleOutcome {
    /// The service produced a title and it was applied.
    Updated(String),
    /// Another exchange already claimed generation for this session.
    AlreadyGenerated,
    /// The attempt failed; the session keeps its placeholder title and no
    /// automatic retry ever happens for this session identity.
    Failed(String),
}

struct ActiveRun {
    session_id: SessionId,
    cancel: CancellationToken,
}

/// Sequences chat exchanges, uploads, and session lifecycle against one
/// transport.
pub struct ChatRuntime {
    transport: Arc<dyn Transport>,
    store: Arc<SessionStore>,
    emitter: Arc<EventEmitter>,
    uploads: UploadCoordinator,
    reveal: RevealMode,
    user_id: String,
    // Sessions that have claimed title generation. Inserted synchronously
    // before the first await of an attempt, so concurrent completions race
    // on the lock, not on the wire.
    titled: Mutex<HashSet<SessionId>>,
    active_runs: Mutex<HashMap<MessageId, ActiveRun>>,
}

impl ChatRuntime {
    /// Create a runtime over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: RuntimeConfig) -> Self {
        let emitter = Arc::new(EventEmitter::new());
        let uploads = UploadCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&emitter),
            config.min_visible,
        );
        Self {
            transport,
            store: Arc::new(SessionStore::new()),
            emitter,
            uploads,
            reveal: config.reveal,
            user_id: config.user_id,
            titled: Mutex::new(HashSet::new()),
            active_runs: Mutex::new(HashMap::new()),
        }
    }

    /// The session store. Presentation renders from its snapshots.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Subscribe to runtime events emitted after this call.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChatEvent> {
        self.emitter.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────

    /// Send a user message and stream the response into a placeholder.
    ///
    /// Returns only after the message reached a terminal state (and, on the
    /// first completed exchange, after the title attempt finished).
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn send(&self, session_id: SessionId, input: &str) -> SendOutcome {
        let query = input.trim();
        if query.is_empty() {
            return SendOutcome::Skipped(SkipReason::BlankInput);
        }
        if self.uploads.is_uploading(session_id) {
            return SendOutcome::Skipped(SkipReason::UploadInProgress);
        }
        if !self.uploads.documents_ready(session_id) {
            return SendOutcome::Skipped(SkipReason::DocumentsNotReady);
        }

        // User message and placeholder land in one update so no snapshot
        // ever shows the question without its pending answer.
        let placeholder = Message::placeholder();
        let message_id = placeholder.id;
        let user_message = Message::user(query);
        let appended = self.store.update(session_id, |session| {
            let mut next = session.clone();
            next.messages.push(user_message.clone());
            next.messages.push(placeholder.clone());
            next
        });
        if !appended {
            return SendOutcome::Skipped(SkipReason::UnknownSession);
        }

        let cancel = CancellationToken::new();
        {
            let mut runs = self.active_runs.lock();
            let _ = runs.insert(
                message_id,
                ActiveRun {
                    session_id,
                    cancel: cancel.clone(),
                },
            );
            metrics::gauge!("quill_active_runs").set(runs.len() as f64);
        }

        let outcome = self
            .run_stream(session_id, message_id, query.to_owned(), cancel)
            .await;

        {
            let mut runs = self.active_runs.lock();
            let _ = runs.remove(&message_id);
            metrics::gauge!("quill_active_runs").set(runs.len() as f64);
        }
        outcome
    }

    async fn run_stream(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        query: String,
        cancel: CancellationToken,
    ) -> SendOutcome {
        let scheduler = RevealScheduler::new(self.reveal, self.reveal_sink(session_id, message_id));

        let request = ChatStreamRequest {
            user_id: self.user_id.clone(),
            session_id,
            query,
        };
        let mut stream = match self.transport.stream_chat(request).await {
            Ok(stream) => stream,
            Err(err) => return self.fail(session_id, message_id, &scheduler, &err.to_string()),
        };

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    return self.cancelled(session_id, message_id, &scheduler);
                }
                item = stream.next() => match item {
                    Some(Ok(fragment)) => scheduler.enqueue(&fragment),
                    Some(Err(err)) => {
                        return self.fail(session_id, message_id, &scheduler, &err.to_string());
                    }
                    None => break,
                },
            }
        }

        // The transport is done but paced reveal may still be draining; the
        // message stays streaming until every unit landed.
        tokio::select! {
            () = cancel.cancelled() => self.cancelled(session_id, message_id, &scheduler),
            () = scheduler.wait_idle() => self.finish(session_id, message_id).await,
        }
    }

    fn reveal_sink(&self, session_id: SessionId, message_id: MessageId) -> RevealSink {
        let store = Arc::clone(&self.store);
        let emitter = Arc::clone(&self.emitter);
        Arc::new(move |unit: String| {
            let mut applied = false;
            let _ = store.update(session_id, |session| {
                let mut next = session.clone();
                if let Some(message) = next.messages.iter_mut().find(|m| m.id == message_id) {
                    // Units racing past a terminal transition are dropped.
                    if message.streaming {
                        message.content.push_str(&unit);
                        applied = true;
                    }
                }
                next
            });
            if applied {
                let _ = emitter.emit(ChatEvent::MessageUpdate {
                    base: BaseEvent::now(session_id),
                    message_id,
                    delta: unit,
                });
            }
        })
    }

    async fn finish(&self, session_id: SessionId, message_id: MessageId) -> SendOutcome {
        let _ = self.store.update(session_id, |session| {
            let mut next = session.clone();
            if let Some(message) = next.messages.iter_mut().find(|m| m.id == message_id) {
                message.streaming = false;
            }
            next
        });
        metrics::counter!("quill_sends_total", "outcome" => "completed").increment(1);
        let _ = self.emitter.emit(ChatEvent::MessageComplete {
            base: BaseEvent::now(session_id),
            message_id,
        });

        if let Some(session) = self.store.get(session_id) {
            if session.title == DEFAULT_TITLE {
                let _ = self.maybe_generate_title(session_id).await;
            }
        }
        SendOutcome::Completed { message_id }
    }

    fn fail(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        scheduler: &RevealScheduler,
        error: &str,
    ) -> SendOutcome {
        scheduler.discard_pending();
        let _ = self.store.update(session_id, |session| {
            let mut next = session.clone();
            if let Some(message) = next.messages.iter_mut().find(|m| m.id == message_id) {
                message.content = ERROR_REPLY.to_owned();
                message.streaming = false;
            }
            next
        });
        metrics::counter!("quill_sends_total", "outcome" => "failed").increment(1);
        warn!(%session_id, error, "stream failed");
        let _ = self.emitter.emit(ChatEvent::MessageFailed {
            base: BaseEvent::now(session_id),
            message_id,
            error: error.to_owned(),
        });
        SendOutcome::Failed { message_id }
    }

    fn cancelled(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        scheduler: &RevealScheduler,
    ) -> SendOutcome {
        scheduler.discard_pending();
        let _ = self.store.update(session_id, |session| {
            let mut next = session.clone();
            if let Some(message) = next.messages.iter_mut().find(|m| m.id == message_id) {
                message.streaming = false;
            }
            next
        });
        metrics::counter!("quill_sends_total", "outcome" => "cancelled").increment(1);
        debug!(%session_id, "stream cancelled");
        let _ = self.emitter.emit(ChatEvent::MessageCancelled {
            base: BaseEvent::now(session_id),
            message_id,
        });
        SendOutcome::Cancelled { message_id }
    }

    /// Cancel one in-flight run. Returns false when no such run exists.
    pub fn cancel(&self, message_id: MessageId) -> bool {
        let runs = self.active_runs.lock();
        match runs.get(&message_id) {
            Some(run) => {
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn abort_session_runs(&self, session_id: SessionId) {
        let runs = self.active_runs.lock();
        for run in runs.values().filter(|r| r.session_id == session_id) {
            run.cancel.cancel();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Title generation
    // ─────────────────────────────────────────────────────────────────────

    /// Ask the service for a title, at most once per session.
    ///
    /// The claim is taken synchronously before the request goes out, so
    /// concurrent completions produce exactly one wire call. The claim is
    /// kept even when the attempt fails: a session identity gets one shot,
    /// and a failure leaves the placeholder title for a manual rename.
    pub async fn maybe_generate_title(&self, session_id: SessionId) -> TitleOutcome {
        if !self.titled.lock().insert(session_id) {
            return TitleOutcome::AlreadyGenerated;
        }
        match self.transport.generate_title(session_id).await {
            Ok(title) => {
                let _ = self.store.update(session_id, |session| {
                    let mut next = session.clone();
                    next.title = title.clone();
                    next
                });
                let _ = self.emitter.emit(ChatEvent::TitleUpdated {
                    base: BaseEvent::now(session_id),
                    title: title.clone(),
                });
                debug!(%session_id, %title, "title generated");
                TitleOutcome::Updated(title)
            }
            Err(err) => {
                warn!(%session_id, error = %err, "title generation failed");
                TitleOutcome::Failed(err.to_string())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Uploads
    // ─────────────────────────────────────────────────────────────────────

    /// Upload a document batch for `session_id`, one file at a time.
    pub async fn upload_documents(
        &self,
        session_id: SessionId,
        files: &[UploadFile],
    ) -> RuntimeResult<usize> {
        self.uploads
            .upload_batch(&self.user_id, session_id, files)
            .await
    }

    /// Whether a batch is currently transferring for `session_id`.
    #[must_use]
    pub fn is_uploading(&self, session_id: SessionId) -> bool {
        self.uploads.is_uploading(session_id)
    }

    /// Whether `session_id` has documents ready to be asked about.
    #[must_use]
    pub fn documents_ready(&self, session_id: SessionId) -> bool {
        self.uploads.documents_ready(session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a session and make it active.
    ///
    /// Registration with the remote store is attempted first so the local
    /// session carries the store-assigned identity; if that fails the
    /// session exists locally only, and persistence is degraded until the
    /// next restart.
    pub async fn new_session(&self) -> SessionId {
        let session = match self
            .transport
            .create_session(&self.user_id, DEFAULT_TITLE)
            .await
        {
            Ok(remote) => {
                let mut session = Session::new();
                session.id = remote.id;
                session.title = remote.title;
                session.created_at = remote.created_at;
                session.updated_at = remote.updated_at;
                session
            }
            Err(err) => {
                warn!(error = %err, "remote session create failed, continuing locally");
                Session::new()
            }
        };
        let id = self.store.insert_front(session);
        let _ = self.store.set_active(id);
        id
    }

    /// Load the user's sessions from the remote store, replacing the local
    /// collection. Returns the number loaded.
    pub async fn load_sessions(&self) -> RuntimeResult<usize> {
        let remote = self.transport.list_sessions(&self.user_id).await?;
        for existing in self.store.snapshot() {
            let _ = self.store.remove(existing.id);
        }
        let count = remote.len();
        for record in remote {
            if record.title != DEFAULT_TITLE {
                // Titled sessions never regenerate.
                let _ = self.titled.lock().insert(record.id);
            }
            let mut session = Session::new();
            session.id = record.id;
            session.title = record.title;
            session.created_at = record.created_at;
            session.updated_at = record.updated_at;
            let _ = self.store.push_back(session);
        }
        debug!(count, "sessions loaded");
        Ok(count)
    }

    /// Switch to `session_id`, hydrating its message log from the remote
    /// store. Runs belonging to the previously active session are cancelled.
    pub async fn open_session(&self, session_id: SessionId) -> RuntimeResult<()> {
        if self.store.get(session_id).is_none() {
            return Err(ChatError::UnknownSession(session_id));
        }
        if let Some(previous) = self.store.active_id() {
            if previous != session_id {
                self.abort_session_runs(previous);
            }
        }

        let fetched = self.transport.fetch_messages(session_id).await?;
        let messages = if fetched.is_empty() {
            vec![Message::assistant(quill_core::message::GREETING)]
        } else {
            fetched.into_iter().map(hydrate_message).collect()
        };
        let _ = self.store.update(session_id, |session| {
            let mut next = session.clone();
            next.messages = messages.clone();
            next
        });
        let _ = self.store.set_active(session_id);
        Ok(())
    }

    /// Rename a session. The new title also closes the auto-generation
    /// window.
    pub async fn rename_session(&self, session_id: SessionId, title: &str) -> RuntimeResult<()> {
        if self.store.get(session_id).is_none() {
            return Err(ChatError::UnknownSession(session_id));
        }
        self.transport.update_title(session_id, title).await?;
        let _ = self.titled.lock().insert(session_id);
        let _ = self.store.update(session_id, |session| {
            let mut next = session.clone();
            next.title = title.to_owned();
            next
        });
        let _ = self.emitter.emit(ChatEvent::TitleUpdated {
            base: BaseEvent::now(session_id),
            title: title.to_owned(),
        });
        Ok(())
    }

    /// Delete a session remotely and locally.
    ///
    /// In-flight runs are cancelled and upload state forgotten first, so
    /// nothing writes into the session after it disappears.
    pub async fn delete_session(&self, session_id: SessionId) -> RuntimeResult<()> {
        if self.store.get(session_id).is_none() {
            return Err(ChatError::UnknownSession(session_id));
        }
        self.abort_session_runs(session_id);
        self.uploads.reset(session_id);
        let _ = self.titled.lock().remove(&session_id);
        self.transport.delete_session(session_id).await?;
        let _ = self.store.remove(session_id);
        Ok(())
    }
}

fn hydrate_message(remote: RemoteMessage) -> Message {
    match remote.role {
        Role::User => Message::user(remote.content),
        Role::Assistant => Message::assistant(remote.content),
    }
}
