//! Transaction Manager
//!
//! A transaction batches writes, defers effect execution, and can undo every
//! write recorded in its scope, either on an explicit rollback call or when
//! the body fails.
//!
//! # State
//!
//! Thread-local, like the tracking context: a nesting depth counter and two
//! cursor-delimited stacks. The rollback log holds boxed inverse actions,
//! one per write performed through the public API while a transaction was
//! open. The deferred queue holds effect callbacks that writes would
//! otherwise have run immediately. Each `transact` level pushes the current
//! length of both onto its cursor stack on entry and owns everything
//! appended above those marks.
//!
//! # Nesting
//!
//! Levels are strictly LIFO. When a nested level commits, its rollback
//! entries merge into the enclosing scope (so an outer rollback still undoes
//! them), but its deferred effects run right away, while the outer
//! transaction is still open. An outer rollback after that does not re-run
//! or undo those effect executions; effects are not part of the rollback
//! log.

use std::cell::RefCell;
use std::marker::PhantomData;

use smallvec::SmallVec;
use tracing::trace;

use super::listener::Listener;

/// An inverse action for one recorded write: restores the previous value and
/// re-invokes the cell's listeners.
type Restore = Box<dyn FnOnce()>;

#[derive(Default)]
struct TxState {
    /// Nesting depth of open transactions on this thread.
    depth: usize,

    /// Inverse actions for every write recorded since the outermost open
    /// transaction began, in recording order.
    rollbacks: Vec<Restore>,

    /// Start position in `rollbacks` for each open level.
    rollback_cursors: SmallVec<[usize; 4]>,

    /// Effect callbacks deferred by in-transaction writes, in queue order.
    deferred: Vec<Listener>,

    /// Start position in `deferred` for each open level.
    deferred_cursors: SmallVec<[usize; 4]>,
}

thread_local! {
    static TX: RefCell<TxState> = RefCell::new(TxState::default());
}

/// Check if a transaction is open on this thread.
pub(crate) fn in_transaction() -> bool {
    TX.with(|tx| tx.borrow().depth > 0)
}

/// Record the inverse of a write about to happen.
///
/// Called by `Signal::set` before overwriting, while a transaction is open.
/// The engine's recompute path never records: a computed re-synchronizes by
/// re-running when its rolled-back dependency notifies.
pub(crate) fn record_restore(restore: Restore) {
    TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        if tx.depth > 0 {
            tx.rollbacks.push(restore);
        }
    });
}

/// Queue an effect callback for execution when the current level completes.
///
/// No de-duplication: every call queues another occurrence, and every
/// occurrence runs.
pub(crate) fn defer(callback: Listener) {
    TX.with(|tx| tx.borrow_mut().deferred.push(callback));
}

fn begin() {
    TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        tx.depth += 1;
        let rollback_cursor = tx.rollbacks.len();
        tx.rollback_cursors.push(rollback_cursor);
        let deferred_cursor = tx.deferred.len();
        tx.deferred_cursors.push(deferred_cursor);
    });
}

/// Undo every write recorded since the current level's cursor.
///
/// No-op when this level already rolled back (the cursor count then lags the
/// depth), which makes a manual rollback followed by a body failure safe.
fn rollback_current() {
    let restores: Vec<Restore> = TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        if tx.rollback_cursors.len() < tx.depth {
            return Vec::new();
        }
        let cursor = tx.rollback_cursors.pop().unwrap_or(0);
        tx.rollbacks.split_off(cursor)
    });

    if restores.is_empty() {
        return;
    }

    trace!(writes = restores.len(), "rolling back");

    // Most-recently-recorded restore replays first, so a cell written
    // several times in this scope converges on its pre-transaction value.
    // Each restore re-invokes the cell's listeners: computeds resynchronize
    // and effect listeners re-enter the deferral decision.
    for restore in restores.into_iter().rev() {
        restore();
    }
}

fn commit() {
    // Recorded restores merge into the enclosing scope, so an outer rollback
    // still undoes writes committed by an inner level.
    TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        if tx.rollback_cursors.len() == tx.depth {
            tx.rollback_cursors.pop();
        }
    });

    // Effects queued at this level run now, oldest first, even while an
    // outer transaction remains open.
    let pending: Vec<Listener> = TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        let cursor = tx.deferred_cursors.pop().unwrap_or(0);
        tx.deferred.split_off(cursor)
    });
    for callback in pending {
        callback();
    }

    TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        tx.depth -= 1;
        release_closed_scope(&mut tx);
    });
}

fn abort() {
    rollback_current();

    // Effects this level queued but never flushed are discarded, including
    // occurrences re-queued by the rollback restores just replayed.
    TX.with(|tx| {
        let mut tx = tx.borrow_mut();
        let cursor = tx.deferred_cursors.pop().unwrap_or(0);
        tx.deferred.truncate(cursor);
        tx.depth -= 1;
        release_closed_scope(&mut tx);
    });
}

/// Drop everything once the outermost level closes.
///
/// With no open transaction there is no cursor left that could ever reach
/// the remaining entries: restores merged into closed scopes, and entries
/// stranded by a manual rollback or by writes inside a deferred-effect
/// flush. Keeping them would grow the logs for the life of the thread.
fn release_closed_scope(tx: &mut TxState) {
    if tx.depth == 0 {
        tx.rollbacks.clear();
        tx.deferred.clear();
    }
}

/// Handle passed to a transaction body for voluntary mid-transaction abort.
pub struct Transaction {
    // Transaction state is thread-local; the handle must not cross threads.
    _not_send: PhantomData<*const ()>,
}

impl Transaction {
    /// Undo every write recorded in this transaction so far, immediately.
    ///
    /// The body keeps running afterwards and the transaction still completes
    /// normally; this is the non-failure way to abandon a batch of writes.
    /// Calling it more than once at the same level is a no-op.
    pub fn rollback(&self) {
        trace!("manual rollback");
        rollback_current();
    }
}

/// Run `body` inside a transaction.
///
/// Writes inside the body take effect immediately and notify computeds as
/// usual, but effect execution is deferred until this level completes, and
/// every write is recorded so it can be undone. On `Ok`, deferred effects
/// run in queue order. On `Err`, every recorded write is rolled back and the
/// same error is returned unchanged; the caller observes state as if the
/// body's writes never happened. A panic in the body rolls back the same way
/// before resuming the unwind.
///
/// Transactions nest; see the module docs for nested commit semantics.
///
/// # Example
///
/// ```
/// use filament_core::{signal, transact};
///
/// let name = signal(String::from("dan"));
///
/// let result: Result<(), &str> = transact(|tx| {
///     name.set(String::from("foo")).unwrap();
///     tx.rollback();
///     Ok(())
/// });
///
/// assert!(result.is_ok());
/// assert_eq!(name.get(), "dan");
/// ```
pub fn transact<T, E, F>(body: F) -> Result<T, E>
where
    F: FnOnce(&Transaction) -> Result<T, E>,
{
    begin();
    trace!("transaction begin");

    let guard = UnwindGuard { armed: true };
    let handle = Transaction {
        _not_send: PhantomData,
    };
    let result = body(&handle);

    match result {
        Ok(value) => {
            guard.disarm();
            trace!("transaction commit");
            commit();
            Ok(value)
        }
        Err(error) => {
            guard.disarm();
            trace!("transaction failed, rolled back");
            abort();
            Err(error)
        }
    }
}

/// Rolls the current level back if the body unwinds.
struct UnwindGuard {
    armed: bool,
}

impl UnwindGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if self.armed {
            abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::computed::computed;
    use crate::reactive::effect::effect;
    use crate::reactive::signal::signal;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn writes_are_visible_inside_and_committed_after() {
        let count = signal(0);

        let result: Result<(), ()> = transact(|_| {
            count.set(1).unwrap();
            assert_eq!(count.get(), 1);
            count.set(2).unwrap();
            assert_eq!(count.get(), 2);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(count.get(), 2);
        assert!(!in_transaction());
    }

    #[test]
    fn manual_rollback_restores_pre_transaction_value() {
        let name = signal(String::from("dan"));

        let result: Result<(), ()> = transact(|tx| {
            name.set(String::from("foo")).unwrap();
            name.set(String::from("bloo")).unwrap();
            tx.rollback();
            assert_eq!(name.get(), "dan");
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(name.get(), "dan");
    }

    #[test]
    fn rollback_resynchronizes_computed_cells() {
        let name = signal(String::from("dan"));
        let uppercased = computed({
            let name = name.clone();
            move || name.get().to_uppercase()
        });

        let result: Result<(), ()> = transact(|tx| {
            name.set(String::from("foo")).unwrap();
            assert_eq!(uppercased.get(), "FOO");
            tx.rollback();
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(name.get(), "dan");
        assert_eq!(uppercased.get(), "DAN");
    }

    #[test]
    fn body_failure_rolls_back_and_propagates() {
        let name = signal(String::from("dan"));

        let result: Result<(), &str> = transact(|_| {
            name.set(String::from("foo")).unwrap();
            name.set(String::from("bloo")).unwrap();
            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(name.get(), "dan");
        assert!(!in_transaction());
    }

    #[test]
    fn effects_defer_until_the_body_returns_without_deduplication() {
        let word = signal(String::from("start"));
        let runs = Arc::new(AtomicI32::new(0));

        effect({
            let word = word.clone();
            let runs = runs.clone();
            move || {
                let _ = word.get();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let result: Result<(), ()> = transact(|_| {
            word.set(String::from("foo")).unwrap();
            word.set(String::from("foo")).unwrap();
            // Both writes are queued, neither has run.
            assert_eq!(runs.load(Ordering::SeqCst), 1);
            Ok(())
        });

        assert!(result.is_ok());
        // One occurrence per recorded write, same value or not.
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failed_transaction_discards_queued_effects() {
        let count = signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                let _ = count.get();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        let result: Result<(), &str> = transact(|_| {
            count.set(5).unwrap();
            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(count.get(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_commit_flushes_inner_effects_while_outer_is_open() {
        let count = signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                let _ = count.get();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let result: Result<(), ()> = transact(|_| {
            count.set(1).unwrap();

            let inner: Result<(), ()> = transact(|_| {
                count.set(2).unwrap();
                Ok(())
            });
            assert!(inner.is_ok());

            // The inner level's queued occurrence already ran, the outer
            // level's has not.
            assert_eq!(runs.load(Ordering::SeqCst), 2);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn outer_rollback_undoes_inner_committed_writes() {
        let count = signal(0);

        let result: Result<(), &str> = transact(|_| {
            count.set(1).unwrap();

            let inner: Result<(), ()> = transact(|_| {
                count.set(2).unwrap();
                Ok(())
            });
            assert!(inner.is_ok());
            assert_eq!(count.get(), 2);

            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn body_can_keep_writing_after_manual_rollback() {
        let count = signal(0);

        let result: Result<(), ()> = transact(|tx| {
            count.set(1).unwrap();
            tx.rollback();
            assert_eq!(count.get(), 0);

            count.set(7).unwrap();
            tx.rollback(); // second call at this level: no-op
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(count.get(), 7);
        assert!(!in_transaction());
    }

    #[test]
    fn panic_in_body_rolls_back_and_unwinds() {
        let count = signal(0);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), ()> = transact(|_| {
                count.set(42).unwrap();
                panic!("intentional panic");
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(count.get(), 0);
        assert!(!in_transaction());
    }

    #[test]
    fn committed_transactions_do_not_accumulate_rollback_entries() {
        let count = signal(0);

        for i in 0..100 {
            let result: Result<(), ()> = transact(|_| {
                count.set(i).unwrap();
                Ok(())
            });
            assert!(result.is_ok());
        }

        // Both logs are released when the outermost level closes; a
        // long-lived thread running many transactions stays flat.
        TX.with(|tx| {
            let tx = tx.borrow();
            assert_eq!(tx.depth, 0);
            assert_eq!(tx.rollbacks.len(), 0);
            assert_eq!(tx.deferred.len(), 0);
            assert!(tx.rollback_cursors.is_empty());
            assert!(tx.deferred_cursors.is_empty());
        });
        assert_eq!(count.get(), 99);
    }

    #[test]
    fn transact_passes_the_value_through() {
        let count = signal(1);

        let result: Result<i32, ()> = transact(|_| {
            count.set(2).unwrap();
            Ok(count.get() * 10)
        });

        assert_eq!(result, Ok(20));
    }
}
