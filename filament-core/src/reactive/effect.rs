//! Effect Scheduler
//!
//! An effect is a side-effecting callback re-invoked whenever one of its
//! dependencies is written.
//!
//! # How Effects Work
//!
//! 1. On registration, the callback runs once immediately inside a tracking
//!    window to capture its dependency set. Like computeds, the set is fixed
//!    by that single run.
//!
//! 2. A transaction-aware listener is registered on each dependency. When a
//!    dependency is written outside a transaction, the callback runs
//!    immediately and synchronously. Inside a transaction, the callback is
//!    queued instead and runs when the enclosing transaction level
//!    completes.
//!
//! 3. No de-duplication: two writes inside one transaction queue the
//!    callback twice, and both occurrences run, even when the written value
//!    did not change.
//!
//! There is no effect handle and no disposal. Once registered, an effect's
//! listener lives in its dependencies' listener sets for the life of those
//! cells.

use std::sync::Arc;

use super::context::TrackingWindow;
use super::listener::{Listener, ListenerId};
use super::transaction;

/// Register a side-effecting observer.
///
/// Runs `callback` once immediately, then again after every write to a cell
/// it read during that first run, subject to transaction deferral.
///
/// # Example
///
/// ```
/// use filament_core::{effect, signal};
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let count = signal(0);
/// let runs = Arc::new(AtomicI32::new(0));
///
/// effect({
///     let count = count.clone();
///     let runs = runs.clone();
///     move || {
///         let _ = count.get();
///         runs.fetch_add(1, Ordering::SeqCst);
///     }
/// });
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
///
/// count.set(3).unwrap();
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
/// ```
pub fn effect<F>(callback: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let callback: Listener = Arc::new(callback);

    let window = TrackingWindow::open();
    callback();
    let dependencies = window.close();

    let deferred = Arc::clone(&callback);
    let listener: Listener = Arc::new(move || {
        if transaction::in_transaction() {
            transaction::defer(Arc::clone(&deferred));
        } else {
            deferred();
        }
    });

    let id = ListenerId::new();
    for dependency in &dependencies {
        dependency.attach(id, Arc::clone(&listener));
    }
}
