//! Error types for the reactive engine.

use thiserror::Error;

/// Errors surfaced by the public API.
///
/// Transaction-body failures are not represented here: `transact` is generic
/// over the caller's error type and returns it unchanged after rolling back.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A write through the public API reached a cell produced by `computed`.
    ///
    /// This is a programming error in the caller; the write is rejected and
    /// the cell is left untouched.
    #[error("cannot write to a read-only cell")]
    ReadOnlyWrite,
}
