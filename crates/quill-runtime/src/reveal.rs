//! Paced reveal of streamed text ("typewriter").
//!
//! Network delivery is bursty; the reveal scheduler decouples how fast
//! content becomes visible from how fast it arrives, while guaranteeing the
//! sink receives exactly the concatenation of the enqueued fragments, in
//! order, with nothing dropped or duplicated.
//!
//! In paced mode, fragments land in a buffer and a single drain task feeds
//! the sink one character at a time with a fixed delay. The `draining` flag
//! is the single-flight guard: it is checked and set under the lock before
//! any suspension point, so a burst of `enqueue` calls grows the buffer the
//! active drain is already consuming instead of spawning a second drain.
//!
//! Completion policy: the orchestrator awaits [`RevealScheduler::wait_idle`]
//! before marking a message done, so a message is never terminal while units
//! are still trickling out. Immediate mode applies each fragment whole and
//! synchronously, which makes `wait_idle` trivially instant.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use quill_settings::{RevealModeSetting, RevealSettings};

/// How streamed fragments become visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealMode {
    /// One character at a time with `unit_delay` between units.
    Paced {
        /// Delay between reveal units.
        unit_delay: Duration,
    },
    /// Each fragment applied whole, no pacing.
    Immediate,
}

impl RevealMode {
    /// Build a mode from settings.
    #[must_use]
    pub fn from_settings(settings: &RevealSettings) -> Self {
        match settings.mode {
            RevealModeSetting::Paced => Self::Paced {
                unit_delay: Duration::from_millis(settings.unit_delay_ms),
            },
            RevealModeSetting::Immediate => Self::Immediate,
        }
    }
}

/// Receives each reveal unit as it becomes visible.
pub type RevealSink = Arc<dyn Fn(String) + Send + Sync>;

struct RevealState {
    buffer: VecDeque<char>,
    draining: bool,
}

/// Per-stream reveal scheduler. One instance per in-flight stream; the
/// buffer and guard are owned here, never shared between streams.
pub struct RevealScheduler {
    mode: RevealMode,
    state: Arc<Mutex<RevealState>>,
    idle: Arc<Notify>,
    sink: RevealSink,
}

impl RevealScheduler {
    /// Create a scheduler feeding `sink`.
    #[must_use]
    pub fn new(mode: RevealMode, sink: RevealSink) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(RevealState {
                buffer: VecDeque::new(),
                draining: false,
            })),
            idle: Arc::new(Notify::new()),
            sink,
        }
    }

    /// Accept the next fragment from the transport.
    ///
    /// Immediate mode forwards it to the sink synchronously. Paced mode
    /// appends it to the buffer and starts a drain task unless one is
    /// already running.
    pub fn enqueue(&self, fragment: &str) {
        match self.mode {
            RevealMode::Immediate => (self.sink)(fragment.to_owned()),
            RevealMode::Paced { unit_delay } => {
                let start_drain = {
                    let mut state = self.state.lock();
                    state.buffer.extend(fragment.chars());
                    if state.draining || state.buffer.is_empty() {
                        false
                    } else {
                        state.draining = true;
                        true
                    }
                };
                if start_drain {
                    self.spawn_drain(unit_delay);
                }
            }
        }
    }

    fn spawn_drain(&self, unit_delay: Duration) {
        let state = Arc::clone(&self.state);
        let idle = Arc::clone(&self.idle);
        let sink = Arc::clone(&self.sink);
        let _ = tokio::spawn(async move {
            loop {
                let unit = {
                    let mut state = state.lock();
                    match state.buffer.pop_front() {
                        Some(c) => c,
                        None => {
                            state.draining = false;
                            idle.notify_waiters();
                            return;
                        }
                    }
                };
                sink(unit.to_string());
                tokio::time::sleep(unit_delay).await;
            }
        });
    }

    /// Wait until the buffer is empty and no drain is in flight.
    pub async fn wait_idle(&self) {
        if self.mode == RevealMode::Immediate {
            return;
        }
        loop {
            let notified = self.idle.notified();
            {
                let state = self.state.lock();
                if state.buffer.is_empty() && !state.draining {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Drop everything still buffered (cancellation path).
    ///
    /// An active drain observes the empty buffer at its next iteration and
    /// stops; units already handed to the sink stay applied.
    pub fn discard_pending(&self) {
        self.state.lock().buffer.clear();
    }

    /// Number of units still waiting to be revealed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().buffer.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
