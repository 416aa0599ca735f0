//! Signal Implementation
//!
//! A Signal is the one cell entity in the engine: a value slot, a
//! writability flag, and a set of listeners invoked on every write.
//!
//! # How Signals Work
//!
//! 1. When a signal is read inside a tracking window, the read is recorded
//!    so that the computed or effect being built can subscribe to it.
//!
//! 2. When a signal's value changes, every listener runs synchronously, in
//!    registration order.
//!
//! 3. Inside a transaction, each write first pushes an inverse restore
//!    action onto the rollback log, so the pre-transaction value can be
//!    recovered on failure.
//!
//! # Thread Safety
//!
//! The value and listener set live behind `parking_lot` locks so handles are
//! cheap to clone and share, but notification runs synchronously on the
//! writing thread and tracking/transaction state is thread-local: each
//! thread owns an independent reactive graph.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::context;
use super::listener::{Listener, ListenerId, ListenerSet, Source};
use super::transaction;
use crate::error::Error;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The shared record behind every signal handle.
pub(crate) struct SignalInner<T> {
    id: u64,

    /// `false` for cells produced by `computed`. Checked at the public write
    /// API only; the recompute and rollback paths go through `store`.
    writeable: bool,

    value: RwLock<T>,

    listeners: ListenerSet,
}

impl<T> SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Overwrite the value slot directly, bypassing the writability check
    /// and the rollback log.
    pub(crate) fn store(&self, value: T) {
        *self.value.write() = value;
    }

    /// Invoke every listener registered at the start of the walk.
    ///
    /// Iterates a snapshot: a listener registered while the walk is in
    /// progress is not invoked for this write, and no lock is held while
    /// listeners run, so listeners may freely read and write cells.
    pub(crate) fn notify(&self) {
        for listener in self.listeners.snapshot() {
            listener();
        }
    }

    pub(crate) fn peek(&self) -> T {
        self.value.read().clone()
    }
}

impl<T> Source for SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn attach(&self, id: ListenerId, listener: Listener) {
        self.listeners.insert(id, listener);
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Handles are cheap clones of a shared record; every holder sees the same
/// value and listener set. There is no destroy operation: a signal lives as
/// long as any holder (including listeners of other signals) retains it.
///
/// # Example
///
/// ```
/// use filament_core::signal;
///
/// let count = signal(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new writable signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_signal_id(),
                writeable: true,
                value: RwLock::new(value),
                listeners: ListenerSet::new(),
            }),
        }
    }

    /// Create a read-only cell. Used by the computed engine; external writes
    /// to the result are rejected while `store` remains available.
    pub(crate) fn read_only(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_signal_id(),
                writeable: false,
                value: RwLock::new(value),
                listeners: ListenerSet::new(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether external code may write to this cell.
    ///
    /// `true` for signals created directly, `false` for cells produced by
    /// `computed`.
    pub fn is_writeable(&self) -> bool {
        self.inner.writeable
    }

    /// Get the current value.
    ///
    /// If called inside a tracking window, records this cell as a dependency
    /// of the computed or effect being constructed.
    pub fn get(&self) -> T {
        context::track(self.inner.clone());
        self.inner.peek()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.peek()
    }

    /// Set a new value and synchronously notify every listener.
    ///
    /// Inside a transaction the previous value is first captured onto the
    /// rollback log. Fails with [`Error::ReadOnlyWrite`] on a cell produced
    /// by `computed`; that is a programming error, never ignored silently.
    pub fn set(&self, value: T) -> Result<(), Error> {
        if !self.inner.writeable {
            return Err(Error::ReadOnlyWrite);
        }

        if transaction::in_transaction() {
            let inner = Arc::clone(&self.inner);
            let previous = self.inner.peek();
            transaction::record_restore(Box::new(move || {
                inner.store(previous);
                inner.notify();
            }));
        }

        trace!(signal = self.inner.id, "write");
        self.inner.store(value);
        self.inner.notify();
        Ok(())
    }

    /// Update the value using a function of the current value.
    ///
    /// Same write semantics as [`Signal::set`]. On a read-only cell the
    /// write is rejected before `f` is invoked.
    pub fn update<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&T) -> T,
    {
        if !self.inner.writeable {
            return Err(Error::ReadOnlyWrite);
        }

        let next = {
            let guard = self.inner.value.read();
            f(&*guard)
        };
        self.set(next)
    }

    /// Register an observer invoked with the new value on every write.
    ///
    /// Runs after any previously registered listeners, in registration
    /// order. Listeners are never removed; the returned ID identifies the
    /// registration for debugging.
    pub fn subscribe<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        let weak = Arc::downgrade(&self.inner);
        self.inner.listeners.insert(
            id,
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let value = inner.peek();
                    f(&value);
                }
            }),
        );
        id
    }

    /// Get the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// The shared record, for wiring done by the computed engine.
    pub(crate) fn shared(&self) -> Arc<SignalInner<T>> {
        Arc::clone(&self.inner)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("writeable", &self.inner.writeable)
            .field("value", &self.get_untracked())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// Create a new writable signal.
///
/// Free-function form of [`Signal::new`].
pub fn signal<T>(value: T) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    Signal::new(value)
}
