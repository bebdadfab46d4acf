//! Sequential multi-file upload with batch-level progress.
//!
//! Files in a batch upload strictly one at a time; the coordinator folds each
//! file's 0–100 byte progress into one monotonic overall percentage and
//! mirrors it as [`ChatEvent::UploadProgress`]. A failure aborts the batch at
//! that file — remaining files are never attempted and the session's send
//! gate stays closed until a later batch succeeds.
//!
//! Fast batches are held visible for a minimum interval before completion is
//! reported, so progress feedback never flashes in and out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use quill_client::{ProgressFn, Transport, UploadFile};
use quill_core::events::{BaseEvent, ChatEvent};
use quill_core::ids::SessionId;

use crate::emitter::EventEmitter;
use crate::errors::{ChatError, RuntimeResult};

/// Overall batch percentage with `file_pct` through file `index` of `count`.
///
/// Completed files each contribute `100 / count`; the file in flight
/// contributes its own percentage scaled down by the batch size. Rounding is
/// held below 100 until the final file actually reports 100, so "100" always
/// means the whole batch transferred.
#[must_use]
pub fn overall_percent(index: usize, count: usize, file_pct: u8) -> u8 {
    if count == 0 {
        return 100;
    }
    if index + 1 >= count && file_pct >= 100 {
        return 100;
    }
    let raw = (index as f64).mul_add(100.0, f64::from(file_pct)) / count as f64;
    (raw.round() as u8).min(99)
}

#[derive(Default)]
struct GateState {
    in_flight: HashSet<SessionId>,
    ready: HashSet<SessionId>,
}

/// Drives upload batches and owns the per-session send gate.
pub struct UploadCoordinator {
    transport: Arc<dyn Transport>,
    emitter: Arc<EventEmitter>,
    min_visible: Duration,
    state: Mutex<GateState>,
}

impl UploadCoordinator {
    /// Create a coordinator.
    ///
    /// `min_visible` is the shortest interval a batch stays observable
    /// before [`ChatEvent::UploadComplete`] is emitted.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        emitter: Arc<EventEmitter>,
        min_visible: Duration,
    ) -> Self {
        Self {
            transport,
            emitter,
            min_visible,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Whether a batch is currently transferring for `session_id`.
    #[must_use]
    pub fn is_uploading(&self, session_id: SessionId) -> bool {
        self.state.lock().in_flight.contains(&session_id)
    }

    /// Whether `session_id` has at least one successfully uploaded batch.
    #[must_use]
    pub fn documents_ready(&self, session_id: SessionId) -> bool {
        self.state.lock().ready.contains(&session_id)
    }

    /// Forget all upload state for a session (deletion path).
    pub fn reset(&self, session_id: SessionId) {
        let mut state = self.state.lock();
        let _ = state.in_flight.remove(&session_id);
        let _ = state.ready.remove(&session_id);
    }

    /// Upload `files` one at a time, in order.
    ///
    /// Returns the number of files uploaded. On failure the batch aborts at
    /// the failed file; earlier files stay uploaded remotely.
    #[instrument(skip_all, fields(session_id = %session_id, files = files.len()))]
    pub async fn upload_batch(
        &self,
        user_id: &str,
        session_id: SessionId,
        files: &[UploadFile],
    ) -> RuntimeResult<usize> {
        if files.is_empty() {
            return Err(ChatError::Validation {
                reason: "empty upload batch",
            });
        }
        {
            let mut state = self.state.lock();
            if !state.in_flight.insert(session_id) {
                return Err(ChatError::Validation {
                    reason: "upload already in progress for this session",
                });
            }
        }

        let started = Instant::now();
        let count = files.len();
        let result = self.run_batch(user_id, session_id, files).await;

        match result {
            Ok(()) => {
                // Keep fast batches observable for at least min_visible.
                let elapsed = started.elapsed();
                if elapsed < self.min_visible {
                    tokio::time::sleep(self.min_visible - elapsed).await;
                }
                {
                    let mut state = self.state.lock();
                    let _ = state.in_flight.remove(&session_id);
                    let _ = state.ready.insert(session_id);
                }
                metrics::counter!("quill_upload_batches_total", "outcome" => "ok").increment(1);
                let _ = self.emitter.emit(ChatEvent::UploadComplete {
                    base: BaseEvent::now(session_id),
                    file_count: count,
                });
                debug!(count, "upload batch complete");
                Ok(count)
            }
            Err((index, source)) => {
                let _ = self.state.lock().in_flight.remove(&session_id);
                let file = files[index].name.clone();
                metrics::counter!("quill_upload_batches_total", "outcome" => "failed")
                    .increment(1);
                warn!(index, file = %file, error = %source, "upload batch aborted");
                let _ = self.emitter.emit(ChatEvent::UploadFailed {
                    base: BaseEvent::now(session_id),
                    file_index: index,
                    file: file.clone(),
                    error: source.to_string(),
                });
                Err(ChatError::PartialFailure {
                    index,
                    file,
                    source,
                })
            }
        }
    }

    async fn run_batch(
        &self,
        user_id: &str,
        session_id: SessionId,
        files: &[UploadFile],
    ) -> Result<(), (usize, quill_client::ClientError)> {
        let count = files.len();
        // Shared across per-file callbacks so overall progress never rewinds
        // at a file boundary.
        let last_overall = Arc::new(Mutex::new(0_u8));

        for (index, file) in files.iter().enumerate() {
            let emitter = Arc::clone(&self.emitter);
            let last = Arc::clone(&last_overall);
            let progress: ProgressFn = Arc::new(move |file_pct| {
                let overall = overall_percent(index, count, file_pct);
                let mut last = last.lock();
                if overall < *last {
                    return;
                }
                *last = overall;
                let _ = emitter.emit(ChatEvent::UploadProgress {
                    base: BaseEvent::now(session_id),
                    file_index: index,
                    file_count: count,
                    overall,
                });
            });

            if let Err(source) = self
                .transport
                .upload_document(user_id, session_id, file, progress)
                .await
            {
                return Err((index, source));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
