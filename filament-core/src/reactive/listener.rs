//! Listener types for the reactive system.
//!
//! A listener is any callback registered on a cell: a computed's recompute
//! closure, an effect's transaction-aware wrapper, or a plain subscriber.
//! Dependency edges in the graph exist only as these registrations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// A callback invoked when a cell's value changes.
///
/// Listeners take no arguments; a listener that cares about the new value
/// reads it from the cell it captured, which at invocation time holds the
/// freshly written value.
pub(crate) type Listener = Arc<dyn Fn() + Send + Sync>;

/// Unique identifier for a listener.
///
/// Each computed, effect, or subscriber gets one ID when created, shared
/// across every cell it registers on. Registering the same ID on a cell
/// twice collapses to a single entry, which is how repeated reads of one
/// dependency during a tracking window avoid duplicate notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// An insertion-ordered set of listeners, deduplicated by identity.
///
/// Iteration order is registration order. The set only grows: the engine
/// supports no effect or computed teardown, so nothing is ever removed.
pub(crate) struct ListenerSet {
    entries: RwLock<IndexMap<ListenerId, Listener>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a listener. A second registration under the same ID is
    /// ignored, keeping the original position in the order.
    pub(crate) fn insert(&self, id: ListenerId, listener: Listener) {
        self.entries.write().entry(id).or_insert(listener);
    }

    /// Clone out the current listeners in registration order.
    ///
    /// Notification iterates a snapshot so that a listener registered during
    /// the walk is not visited for the same write, and so no lock is held
    /// while listeners run.
    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.entries.read().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// A type-erased dependency target recorded by the tracking context.
///
/// Implemented by the shared cell record so that tracking windows can hold
/// cells of mixed value types and wire listeners onto them afterwards.
pub(crate) trait Source: Send + Sync {
    /// Register a listener on this cell.
    fn attach(&self, id: ListenerId, listener: Listener);
}
