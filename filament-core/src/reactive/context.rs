//! Tracking Context
//!
//! The tracking context records which cells are read during a bounded
//! window. Both `computed` and `effect` open a window around the first run
//! of their closure to discover the dependency set they will subscribe to.
//!
//! # Implementation
//!
//! We use a thread-local read log: an ordered sequence of type-erased cell
//! handles plus a stack of cursor positions, one per open window. Opening a
//! window pushes the current log length; closing it splits off everything
//! appended since. Windows nest (a computed built inside another computed's
//! producer) and must close in LIFO order.
//!
//! Every read inside a window is appended, repeats included; registration
//! deduplicates later by listener identity. Reads outside any window are not
//! recorded, since no cursor could ever slice them out.

use std::cell::RefCell;
use std::sync::Arc;

use smallvec::SmallVec;

use super::listener::Source;

thread_local! {
    static READ_LOG: RefCell<ReadLog> = RefCell::new(ReadLog::new());
}

struct ReadLog {
    /// Cells read since the bottom-most open window, in read order.
    reads: Vec<Arc<dyn Source>>,
    /// Start position of each currently open window.
    cursors: SmallVec<[usize; 4]>,
}

impl ReadLog {
    fn new() -> Self {
        Self {
            reads: Vec::new(),
            cursors: SmallVec::new(),
        }
    }
}

/// Record a cell read in the innermost open tracking window, if any.
///
/// Called by `Signal::get`.
pub(crate) fn track(source: Arc<dyn Source>) {
    READ_LOG.with(|log| {
        let mut log = log.borrow_mut();
        if !log.cursors.is_empty() {
            log.reads.push(source);
        }
    });
}

/// Guard for one tracking window.
///
/// Closing the window yields the captured dependency list. If the guard is
/// dropped instead (a panic inside the tracked closure), the window's reads
/// are discarded and the log is left consistent for enclosing windows.
pub(crate) struct TrackingWindow {
    opened_at: usize,
}

impl TrackingWindow {
    /// Open a window at the current end of the read log.
    pub(crate) fn open() -> Self {
        let opened_at = READ_LOG.with(|log| {
            let mut log = log.borrow_mut();
            let cursor = log.reads.len();
            log.cursors.push(cursor);
            cursor
        });

        Self { opened_at }
    }

    /// Close the window, returning every cell read since it opened, in read
    /// order with repeats.
    pub(crate) fn close(self) -> Vec<Arc<dyn Source>> {
        let reads = READ_LOG.with(|log| {
            let mut log = log.borrow_mut();
            let cursor = log.cursors.pop().unwrap_or(0);

            // Windows close LIFO; a mismatch means an enclosing window was
            // closed out of order.
            debug_assert_eq!(cursor, self.opened_at, "tracking window closed out of order");

            log.reads.split_off(cursor)
        });

        // The Drop impl handles the abandoned-window path only.
        std::mem::forget(self);

        reads
    }
}

impl Drop for TrackingWindow {
    fn drop(&mut self) {
        READ_LOG.with(|log| {
            let mut log = log.borrow_mut();
            if let Some(cursor) = log.cursors.pop() {
                log.reads.truncate(cursor);
            }
        });
    }
}
