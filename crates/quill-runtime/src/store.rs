//! Session collection with a pure functional update contract.
//!
//! Every mutation replaces exactly the targeted session with a transformed
//! copy; all other sessions keep their `Arc` identity. Interleaved updates
//! (a reveal unit racing a mark-complete) each apply their own small
//! transformation to the latest snapshot instead of overwriting each other,
//! and readers always observe a consistent snapshot.
//!
//! The two mutation operations are deliberately distinct: [`SessionStore::replace`]
//! for wholesale replacement and [`SessionStore::update`] for transformation —
//! never one API that inspects its argument to decide.

use std::sync::Arc;

use parking_lot::RwLock;

use quill_core::ids::SessionId;
use quill_core::message::Session;

#[derive(Default)]
struct StoreInner {
    sessions: Vec<Arc<Session>>,
    active: Option<SessionId>,
}

/// Holds all sessions plus the active-session pointer.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<StoreInner>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session at the front of the collection (newest first).
    pub fn insert_front(&self, session: Session) -> SessionId {
        let id = session.id;
        let mut inner = self.inner.write();
        inner.sessions.insert(0, Arc::new(session));
        id
    }

    /// Append a session at the back (used when loading from the remote
    /// store, which returns them already ordered).
    pub fn push_back(&self, session: Session) -> SessionId {
        let id = session.id;
        let mut inner = self.inner.write();
        inner.sessions.push(Arc::new(session));
        id
    }

    /// Replace a session wholesale, matched by id.
    ///
    /// Returns false (and changes nothing) when the id is unknown.
    pub fn replace(&self, session: Session) -> bool {
        let mut inner = self.inner.write();
        match inner.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(slot) => {
                *slot = Arc::new(session);
                true
            }
            None => false,
        }
    }

    /// Apply a transformation to the latest snapshot of one session.
    ///
    /// `f` must preserve the session's identity; it receives the current
    /// value and returns the replacement. Returns false when the id is
    /// unknown.
    pub fn update(&self, id: SessionId, f: impl FnOnce(&Session) -> Session) -> bool {
        let mut inner = self.inner.write();
        match inner.sessions.iter_mut().find(|s| s.id == id) {
            Some(slot) => {
                let next = f(slot);
                debug_assert_eq!(next.id, id, "update must preserve session identity");
                *slot = Arc::new(next);
                true
            }
            None => false,
        }
    }

    /// Remove a session. Clears the active pointer if it pointed there.
    pub fn remove(&self, id: SessionId) -> bool {
        let mut inner = self.inner.write();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.id != id);
        let removed = inner.sessions.len() < before;
        if removed && inner.active == Some(id) {
            inner.active = None;
        }
        removed
    }

    /// Snapshot of one session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.inner.read().sessions.iter().find(|s| s.id == id).cloned()
    }

    /// Snapshot of the whole collection, in display order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.inner.read().sessions.clone()
    }

    /// Point the active-session pointer at `id`.
    ///
    /// Returns false when the id is unknown (pointer unchanged).
    pub fn set_active(&self, id: SessionId) -> bool {
        let mut inner = self.inner.write();
        if inner.sessions.iter().any(|s| s.id == id) {
            inner.active = Some(id);
            true
        } else {
            false
        }
    }

    /// The active session's id, if one is set.
    #[must_use]
    pub fn active_id(&self) -> Option<SessionId> {
        self.inner.read().active
    }

    /// Snapshot of the active session.
    #[must_use]
    pub fn active(&self) -> Option<Arc<Session>> {
        let inner = self.inner.read();
        let id = inner.active?;
        inner.sessions.iter().find(|s| s.id == id).cloned()
    }

    /// Number of sessions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().sessions.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
