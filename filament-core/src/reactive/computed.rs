//! Computed Engine
//!
//! A computed cell is a read-only signal whose value is produced by a
//! function over other cells, kept fresh eagerly at write time.
//!
//! # How Computeds Work
//!
//! 1. On construction, the producer runs once inside a tracking window.
//!    The cells it reads during that single call are its dependency set,
//!    permanently.
//!
//! 2. A recompute closure is registered as a listener on each dependency.
//!    When any of them is written, the producer re-runs and the result is
//!    stored directly into the cell, bypassing the writability check and
//!    the transaction rollback log: recomputation is a derived consequence
//!    of the upstream write, and rolling back the upstream value re-runs
//!    this same closure to restore consistency.
//!
//! 3. After storing, the cell's own listeners run, so computeds chained on
//!    this one and effects observing it stay fresh without being direct
//!    dependents of the original signal.
//!
//! # Fixed Dependencies
//!
//! The dependency set is captured from one call only. A producer with
//! conditional logic that reads a different cell on a later call never picks
//! up the new dependency; writes to it will not trigger recomputation. This
//! is a documented contract of the engine, not an oversight.

use std::sync::Arc;

use tracing::trace;

use super::context::TrackingWindow;
use super::listener::{Listener, ListenerId};
use super::signal::Signal;

/// Build a read-only cell kept consistent with the cells its producer reads.
///
/// The producer runs once immediately; its result seeds the cell and its
/// reads fix the dependency set. Writing to the returned cell fails with
/// [`crate::Error::ReadOnlyWrite`].
///
/// # Example
///
/// ```
/// use filament_core::{computed, signal};
///
/// let count = signal(1);
/// let doubled = computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 2);
///
/// count.set(10).unwrap();
/// assert_eq!(doubled.get(), 20);
/// ```
pub fn computed<T, F>(producer: F) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    let window = TrackingWindow::open();
    let initial = producer();
    let dependencies = window.close();

    let cell = Signal::read_only(initial);
    trace!(cell = cell.id(), dependencies = dependencies.len(), "computed constructed");

    let inner = cell.shared();
    let recompute: Listener = Arc::new(move || {
        let value = producer();
        inner.store(value);
        inner.notify();
    });

    // One listener identity across all dependencies: repeated reads of the
    // same cell collapse to a single registration.
    let id = ListenerId::new();
    for dependency in &dependencies {
        dependency.attach(id, Arc::clone(&recompute));
    }

    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::signal::signal;

    #[test]
    fn computed_produces_initial_value() {
        let count = signal(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });
        assert_eq!(doubled.get(), 2);
    }

    #[test]
    fn computed_is_fresh_after_every_dependency_write() {
        let count = signal(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });

        count.set(10).unwrap();
        assert_eq!(doubled.get(), 20);

        count.set(-3).unwrap();
        assert_eq!(doubled.get(), -6);
    }

    #[test]
    fn computed_rejects_external_writes() {
        let count = signal(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });

        assert!(!doubled.is_writeable());
        assert_eq!(doubled.set(99), Err(Error::ReadOnlyWrite));
        assert_eq!(doubled.get(), 2);
    }

    #[test]
    fn computed_chains_stay_fresh() {
        let name = signal(String::from("dan"));
        let uppercased = computed({
            let name = name.clone();
            move || name.get().to_uppercase()
        });
        let reversed = computed({
            let uppercased = uppercased.clone();
            move || uppercased.get().chars().rev().collect::<String>()
        });
        let length = computed({
            let name = name.clone();
            move || name.get().len()
        });
        let together = computed({
            let uppercased = uppercased.clone();
            let reversed = reversed.clone();
            let length = length.clone();
            move || format!("{} {} {}", uppercased.get(), reversed.get(), length.get())
        });

        assert_eq!(together.get(), "DAN NAD 3");

        name.set(String::from("filament")).unwrap();
        assert_eq!(together.get(), "FILAMENT TNEMALIF 8");
    }

    #[test]
    fn diamond_dependencies_converge() {
        let base = signal(2);
        let left = computed({
            let base = base.clone();
            move || base.get() * 10
        });
        let right = computed({
            let base = base.clone();
            move || base.get() + 1
        });
        let joined = computed({
            let left = left.clone();
            let right = right.clone();
            move || left.get() + right.get()
        });

        assert_eq!(joined.get(), 23);

        base.set(5).unwrap();
        // Consistent with one evaluation of the whole producer graph.
        assert_eq!(joined.get(), 56);
    }

    #[test]
    fn conditional_dependency_is_never_picked_up() {
        let flag = signal(true);
        let when_true = signal(1);
        let when_false = signal(100);

        let picked = computed({
            let flag = flag.clone();
            let when_true = when_true.clone();
            let when_false = when_false.clone();
            move || {
                if flag.get() {
                    when_true.get()
                } else {
                    when_false.get()
                }
            }
        });
        assert_eq!(picked.get(), 1);

        // Switching the flag recomputes: flag was read during construction.
        flag.set(false).unwrap();
        assert_eq!(picked.get(), 100);

        // But when_false was never tracked, so its writes are invisible.
        when_false.set(200).unwrap();
        assert_eq!(picked.get(), 100);
    }

    #[test]
    fn repeated_reads_register_one_recompute() {
        let count = signal(1);
        let summed = computed({
            let count = count.clone();
            move || count.get() + count.get() + count.get()
        });

        assert_eq!(summed.get(), 3);
        assert_eq!(count.listener_count(), 1);

        count.set(2).unwrap();
        assert_eq!(summed.get(), 6);
    }
}
