//! End-to-end runtime flows over a scripted in-memory transport.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt as _;
use futures::stream;
use tokio::sync::Notify;

use quill_client::{
    ChatStream, ChatStreamRequest, ClientError, ClientResult, ProgressFn, RemoteMessage,
    RemoteSession, Transport, UploadFile,
};
use quill_core::ids::SessionId;
use quill_core::message::{DEFAULT_TITLE, ERROR_REPLY, Message, Role, Session};
use quill_runtime::{ChatError, ChatRuntime, RevealMode, RuntimeConfig, SendOutcome, SkipReason};

// ─────────────────────────────────────────────────────────────────────────────
// Scripted transport
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeTransport {
    fragments: Vec<String>,
    fail_stream: bool,
    hang_stream: bool,
    title: String,
    fail_title: bool,
    fail_upload_at: Option<usize>,
    hold_uploads: Option<Arc<Notify>>,
    sessions: Vec<RemoteSession>,
    remote_messages: Vec<RemoteMessage>,
    title_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeTransport {
    fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| (*s).to_owned()).collect(),
            title: "Document Q&A".to_owned(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn stream_chat(&self, _request: ChatStreamRequest) -> ClientResult<ChatStream> {
        if self.fail_stream {
            return Err(ClientError::Api {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }
        let items = self
            .fragments
            .clone()
            .into_iter()
            .map(Ok)
            .collect::<Vec<_>>();
        if self.hang_stream {
            Ok(Box::pin(stream::iter(items).chain(stream::pending())))
        } else {
            Ok(Box::pin(stream::iter(items)))
        }
    }

    async fn upload_document(
        &self,
        _user_id: &str,
        _session_id: SessionId,
        _file: &UploadFile,
        progress: ProgressFn,
    ) -> ClientResult<serde_json::Value> {
        let index = self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold_uploads {
            hold.notified().await;
        }
        if self.fail_upload_at == Some(index) {
            return Err(ClientError::Api {
                status: 400,
                message: "unsupported file type".into(),
            });
        }
        for pct in [0, 50, 100] {
            progress(pct);
        }
        Ok(serde_json::json!({ "status": "ok" }))
    }

    async fn generate_title(&self, _session_id: SessionId) -> ClientResult<String> {
        let _ = self.title_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_title {
            return Err(ClientError::Api {
                status: 502,
                message: "model unavailable".into(),
            });
        }
        Ok(self.title.clone())
    }

    async fn create_session(&self, _user_id: &str, title: &str) -> ClientResult<RemoteSession> {
        Ok(RemoteSession {
            id: SessionId::new(),
            title: title.to_owned(),
            created_at: None,
            updated_at: None,
        })
    }

    async fn list_sessions(&self, _user_id: &str) -> ClientResult<Vec<RemoteSession>> {
        Ok(self.sessions.clone())
    }

    async fn fetch_messages(&self, _session_id: SessionId) -> ClientResult<Vec<RemoteMessage>> {
        Ok(self.remote_messages.clone())
    }

    async fn update_title(&self, _session_id: SessionId, _title: &str) -> ClientResult<()> {
        Ok(())
    }

    async fn delete_session(&self, _session_id: SessionId) -> ClientResult<()> {
        let _ = self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

fn runtime(transport: Arc<FakeTransport>, reveal: RevealMode) -> Arc<ChatRuntime> {
    Arc::new(ChatRuntime::new(
        transport,
        RuntimeConfig {
            user_id: "local".to_owned(),
            reveal,
            min_visible: Duration::ZERO,
        },
    ))
}

fn paced() -> RevealMode {
    RevealMode::Paced {
        unit_delay: Duration::from_millis(15),
    }
}

async fn ready_session(rt: &ChatRuntime) -> SessionId {
    let sid = rt.new_session().await;
    let _ = rt
        .upload_documents(sid, &[UploadFile::new("doc.pdf", b"data".to_vec())])
        .await
        .unwrap();
    sid
}

fn assistant_reply(rt: &ChatRuntime, sid: SessionId) -> Message {
    rt.store()
        .get(sid)
        .unwrap()
        .messages
        .last()
        .cloned()
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Sending
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn paced_send_reveals_exact_concatenation() {
    let transport = Arc::new(FakeTransport::streaming(&["Hel", "lo, ", "world!"]));
    let rt = runtime(Arc::clone(&transport), paced());
    let sid = ready_session(&rt).await;

    let outcome = rt.send(sid, "what does the document say?").await;
    assert!(matches!(outcome, SendOutcome::Completed { .. }));

    let reply = assistant_reply(&rt, sid);
    assert_eq!(reply.content, "Hello, world!");
    assert!(!reply.streaming);
    assert_eq!(rt.store().get(sid).unwrap().streaming_count(), 0);
}

#[tokio::test]
async fn immediate_send_applies_fragments_whole() {
    let transport = Arc::new(FakeTransport::streaming(&["Hel", "lo"]));
    let rt = runtime(transport, RevealMode::Immediate);
    let sid = ready_session(&rt).await;

    let outcome = rt.send(sid, "hi").await;
    assert!(matches!(outcome, SendOutcome::Completed { .. }));
    assert_eq!(assistant_reply(&rt, sid).content, "Hello");
}

#[tokio::test(start_paused = true)]
async fn send_appends_user_message_and_placeholder_together() {
    let transport = Arc::new(FakeTransport::streaming(&["ok"]));
    let rt = runtime(transport, paced());
    let sid = ready_session(&rt).await;

    let _ = rt.send(sid, "  question  ").await;
    let session = rt.store().get(sid).unwrap();
    // Greeting, trimmed user message, completed reply.
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[1].role, Role::User);
    assert_eq!(session.messages[1].content, "question");
    assert_eq!(session.messages[2].role, Role::Assistant);
}

#[tokio::test]
async fn blank_input_is_a_noop() {
    let transport = Arc::new(FakeTransport::streaming(&["ok"]));
    let rt = runtime(transport, RevealMode::Immediate);
    let sid = ready_session(&rt).await;

    let outcome = rt.send(sid, "   \n\t ").await;
    assert_eq!(outcome, SendOutcome::Skipped(SkipReason::BlankInput));
    assert_eq!(rt.store().get(sid).unwrap().messages.len(), 1);
}

#[tokio::test]
async fn send_requires_uploaded_documents() {
    let transport = Arc::new(FakeTransport::streaming(&["ok"]));
    let rt = runtime(transport, RevealMode::Immediate);
    let sid = rt.new_session().await;

    let outcome = rt.send(sid, "anything there?").await;
    assert_eq!(outcome, SendOutcome::Skipped(SkipReason::DocumentsNotReady));
}

#[tokio::test]
async fn unknown_session_is_skipped() {
    let transport = Arc::new(FakeTransport::streaming(&["ok"]));
    let rt = runtime(transport, RevealMode::Immediate);
    // Gate state without a matching session in the store.
    let sid = ready_session(&rt).await;
    let _ = rt.store().remove(sid);

    let outcome = rt.send(sid, "hello").await;
    assert_eq!(outcome, SendOutcome::Skipped(SkipReason::UnknownSession));
}

#[tokio::test(start_paused = true)]
async fn stream_failure_writes_the_error_reply() {
    let transport = Arc::new(FakeTransport {
        fail_stream: true,
        ..FakeTransport::default()
    });
    let rt = runtime(Arc::clone(&transport), paced());
    let sid = ready_session(&rt).await;

    let outcome = rt.send(sid, "boom?").await;
    assert!(matches!(outcome, SendOutcome::Failed { .. }));

    let reply = assistant_reply(&rt, sid);
    assert_eq!(reply.content, ERROR_REPLY);
    assert!(reply.is_error());
    assert!(!reply.streaming);
    // Failed exchanges never trigger title generation.
    assert_eq!(transport.title_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_the_revealed_prefix() {
    let transport = Arc::new(FakeTransport {
        hang_stream: true,
        ..FakeTransport::streaming(&["Hello there"])
    });
    let rt = runtime(transport, paced());
    let sid = ready_session(&rt).await;
    let mut rx = rt.subscribe();

    let task = tokio::spawn({
        let rt = Arc::clone(&rt);
        async move { rt.send(sid, "long question").await }
    });

    // Wait until at least one reveal unit landed.
    loop {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let session = rt.store().get(sid).unwrap();
        if let Some(placeholder) = session.messages.iter().find(|m| m.streaming) {
            if !placeholder.content.is_empty() {
                assert!(rt.cancel(placeholder.id));
                break;
            }
        }
    }

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, SendOutcome::Cancelled { .. }));

    let reply = assistant_reply(&rt, sid);
    assert!(!reply.streaming);
    assert!(!reply.content.is_empty());
    assert!("Hello there".starts_with(&reply.content));

    // Subscribers see cancellation as its own event, not a completion.
    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type());
    }
    assert!(types.contains(&"message_cancelled"));
    assert!(!types.contains(&"message_complete"));
}

#[tokio::test]
async fn cancel_without_a_run_returns_false() {
    let transport = Arc::new(FakeTransport::streaming(&["ok"]));
    let rt = runtime(transport, RevealMode::Immediate);
    assert!(!rt.cancel(quill_core::ids::MessageId::new()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Uploads
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn send_is_skipped_while_a_batch_is_transferring() {
    let hold = Arc::new(Notify::new());
    let transport = Arc::new(FakeTransport {
        hold_uploads: Some(Arc::clone(&hold)),
        ..FakeTransport::streaming(&["ok"])
    });
    let rt = runtime(transport, RevealMode::Immediate);
    let sid = rt.new_session().await;

    let upload = tokio::spawn({
        let rt = Arc::clone(&rt);
        async move {
            rt.upload_documents(sid, &[UploadFile::new("a.pdf", b"data".to_vec())])
                .await
        }
    });
    // The in-flight mark is set before the transfer awaits anything.
    while !rt.is_uploading(sid) {
        tokio::task::yield_now().await;
    }

    let outcome = rt.send(sid, "too early").await;
    assert_eq!(outcome, SendOutcome::Skipped(SkipReason::UploadInProgress));

    hold.notify_one();
    let uploaded = upload.await.unwrap().unwrap();
    assert_eq!(uploaded, 1);
    assert!(rt.documents_ready(sid));
}

#[tokio::test(start_paused = true)]
async fn aborted_batch_never_attempts_remaining_files() {
    let transport = Arc::new(FakeTransport {
        fail_upload_at: Some(1),
        ..FakeTransport::streaming(&["ok"])
    });
    let rt = runtime(Arc::clone(&transport), RevealMode::Immediate);
    let sid = rt.new_session().await;

    let files = vec![
        UploadFile::new("a.pdf", b"a".to_vec()),
        UploadFile::new("b.pdf", b"b".to_vec()),
        UploadFile::new("c.pdf", b"c".to_vec()),
    ];
    let err = rt.upload_documents(sid, &files).await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::PartialFailure { index: 1, .. }
    ));

    // First file succeeded, second failed, third was never sent.
    assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 2);
    assert!(!rt.documents_ready(sid));
    assert_eq!(
        rt.send(sid, "ready?").await,
        SendOutcome::Skipped(SkipReason::DocumentsNotReady)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Title generation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn title_is_generated_once_across_racing_sends() {
    let transport = Arc::new(FakeTransport::streaming(&["answer"]));
    let rt = runtime(Arc::clone(&transport), paced());
    let sid = ready_session(&rt).await;

    let (a, b) = tokio::join!(rt.send(sid, "first"), rt.send(sid, "second"));
    assert!(matches!(a, SendOutcome::Completed { .. }));
    assert!(matches!(b, SendOutcome::Completed { .. }));

    assert_eq!(transport.title_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rt.store().get(sid).unwrap().title, "Document Q&A");
}

#[tokio::test(start_paused = true)]
async fn failed_title_attempt_is_never_retried() {
    let transport = Arc::new(FakeTransport {
        fail_title: true,
        ..FakeTransport::streaming(&["answer"])
    });
    let rt = runtime(Arc::clone(&transport), RevealMode::Immediate);
    let sid = ready_session(&rt).await;

    let _ = rt.send(sid, "first").await;
    assert_eq!(rt.store().get(sid).unwrap().title, DEFAULT_TITLE);

    // One shot per session identity: later completed exchanges leave the
    // placeholder title alone rather than going back to the wire.
    let _ = rt.send(sid, "second").await;
    assert_eq!(transport.title_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rt.store().get(sid).unwrap().title, DEFAULT_TITLE);
}

#[tokio::test]
async fn renamed_session_never_auto_generates() {
    let transport = Arc::new(FakeTransport::streaming(&["answer"]));
    let rt = runtime(Arc::clone(&transport), RevealMode::Immediate);
    let sid = ready_session(&rt).await;

    rt.rename_session(sid, "My research").await.unwrap();
    let _ = rt.send(sid, "question").await;

    assert_eq!(transport.title_calls.load(Ordering::SeqCst), 0);
    assert_eq!(rt.store().get(sid).unwrap().title, "My research");
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_session_is_active_and_greeted() {
    let transport = Arc::new(FakeTransport::streaming(&[]));
    let rt = runtime(transport, RevealMode::Immediate);

    let sid = rt.new_session().await;
    assert_eq!(rt.store().active_id(), Some(sid));
    let session = rt.store().get(sid).unwrap();
    assert_eq!(session.title, DEFAULT_TITLE);
    assert!(session.is_empty_conversation());
}

#[tokio::test]
async fn load_sessions_replaces_the_local_collection() {
    let transport = Arc::new(FakeTransport {
        sessions: vec![
            RemoteSession {
                id: SessionId::new(),
                title: "Quarterly report".to_owned(),
                created_at: None,
                updated_at: None,
            },
            RemoteSession {
                id: SessionId::new(),
                title: DEFAULT_TITLE.to_owned(),
                created_at: None,
                updated_at: None,
            },
        ],
        ..FakeTransport::default()
    });
    let rt = runtime(transport, RevealMode::Immediate);
    let _ = rt.store().insert_front(Session::new());

    let loaded = rt.load_sessions().await.unwrap();
    assert_eq!(loaded, 2);
    let snapshot = rt.store().snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].title, "Quarterly report");
}

#[tokio::test]
async fn open_session_hydrates_the_message_log() {
    let transport = Arc::new(FakeTransport {
        remote_messages: vec![
            RemoteMessage {
                role: Role::User,
                content: "what is this?".to_owned(),
            },
            RemoteMessage {
                role: Role::Assistant,
                content: "a report".to_owned(),
            },
        ],
        ..FakeTransport::default()
    });
    let rt = runtime(transport, RevealMode::Immediate);
    let sid = rt.new_session().await;

    rt.open_session(sid).await.unwrap();
    let session = rt.store().get(sid).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, Role::User);
    assert!(session.messages.iter().all(|m| !m.streaming));
    assert_eq!(rt.store().active_id(), Some(sid));
}

#[tokio::test]
async fn open_unknown_session_is_an_error() {
    let transport = Arc::new(FakeTransport::default());
    let rt = runtime(transport, RevealMode::Immediate);
    let err = rt.open_session(SessionId::new()).await.unwrap_err();
    assert!(matches!(err, ChatError::UnknownSession(_)));
}

#[tokio::test]
async fn delete_session_clears_local_state_and_gates() {
    let transport = Arc::new(FakeTransport::streaming(&["ok"]));
    let rt = runtime(Arc::clone(&transport), RevealMode::Immediate);
    let sid = ready_session(&rt).await;
    assert!(rt.documents_ready(sid));

    rt.delete_session(sid).await.unwrap();
    assert!(rt.store().get(sid).is_none());
    assert!(!rt.documents_ready(sid));
    assert_eq!(transport.delete_calls.load(Ordering::SeqCst), 1);
}
