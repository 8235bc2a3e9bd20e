//! Registry of live sessions.
//!
//! `SessionRegistry` stores non-owning weak references to session state,
//! allowing other tasks to write to live sessions without keeping finished
//! sessions alive. Dead entries can be pruned opportunistically or lazily at
//! lookup time.

use std::{
    fmt,
    sync::{
        Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;

use super::{
    SessionHandle,
    handle::Shared,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Allocate a process-unique identifier.
    #[must_use]
    pub fn next() -> Self { Self(NEXT_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "ConnectionId({})", self.0) }
}

/// Concurrent registry of session handles keyed by [`ConnectionId`].
#[derive(Default)]
pub struct SessionRegistry(DashMap<ConnectionId, Weak<Shared>>);

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("entries", &self.0.len())
            .finish()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Retrieve a handle for `id` if the session is still alive.
    pub fn get(&self, id: &ConnectionId) -> Option<SessionHandle> {
        let guard = self.0.get(id);
        let shared = guard.as_ref().and_then(|weak| weak.upgrade());
        drop(guard);
        if shared.is_none() {
            self.0.remove_if(id, |_, weak| weak.strong_count() == 0);
        }
        shared.map(SessionHandle::from_arc)
    }

    /// Insert the handle of a newly started session under its own id.
    pub fn insert(&self, handle: &SessionHandle) { self.0.insert(handle.id(), handle.downgrade()); }

    /// Remove a handle, typically on session teardown.
    pub fn remove(&self, id: &ConnectionId) { self.0.remove(id); }

    /// Number of entries, including any not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` if the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Remove all stale weak references without returning any handles.
    ///
    /// `DashMap::retain` acquires per-bucket write locks, so other operations
    /// may contend briefly while the registry is pruned.
    pub fn prune(&self) { self.0.retain(|_, weak| weak.strong_count() > 0); }

    /// Prune stale weak references, then collect the remaining live handles.
    ///
    /// This holds per-bucket write locks while iterating. Use [`prune`] from a
    /// maintenance task when only cleanup is required.
    ///
    /// [`prune`]: Self::prune
    #[must_use]
    pub fn active_handles(&self) -> Vec<SessionHandle> {
        let mut handles = Vec::with_capacity(self.0.len());
        self.0.retain(|_, weak| {
            if let Some(shared) = weak.upgrade() {
                handles.push(SessionHandle::from_arc(shared));
                true
            } else {
                false
            }
        });
        handles
    }

    /// Prune stale weak references, then return the IDs of the live sessions.
    #[must_use]
    pub fn active_ids(&self) -> Vec<ConnectionId> {
        let mut ids = Vec::with_capacity(self.0.len());
        self.0.retain(|id, weak| {
            if weak.strong_count() > 0 {
                ids.push(*id);
                true
            } else {
                false
            }
        });
        ids
    }

    /// Request a graceful close of every live session, returning how many
    /// were asked to close.
    pub fn close_all(&self) -> usize {
        let handles = self.active_handles();
        for handle in &handles {
            handle.close();
        }
        handles.len()
    }
}
