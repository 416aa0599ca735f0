//! Reactive Primitives
//!
//! This module implements the core reactive engine: signals, computed cells,
//! effects, and transactions.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a mutable observable cell. Reading it inside a tracking
//! window records a dependency; writing it synchronously notifies every
//! registered listener with the new value.
//!
//! ## Computed cells
//!
//! [`computed`] builds a read-only cell whose value is derived by a function
//! over other cells. Dependencies are captured once, from the producer's
//! first run, and the cell is recomputed eagerly at write time: it is always
//! fresh immediately after a dependency write returns.
//!
//! ## Effects
//!
//! [`effect`] registers a side-effecting callback against the cells it reads
//! on its first run. Outside a transaction it re-runs synchronously on every
//! dependency write; inside one, executions are queued until the transaction
//! level completes.
//!
//! ## Transactions
//!
//! [`transact`] batches writes, defers effects, and undoes every recorded
//! write on failure or on an explicit rollback call.
//!
//! # Implementation Notes
//!
//! There is no explicit dependency-graph structure. Edges exist only as
//! listener registrations: a computed's recompute closure or an effect's
//! wrapper sitting in each dependency's listener set. Listener sets only
//! grow; the engine supports no disposal, so long-lived cells accumulate one
//! listener per computed or effect ever built from them.

mod computed;
mod context;
mod effect;
mod listener;
mod signal;
mod transaction;

pub use computed::computed;
pub use effect::effect;
pub use listener::ListenerId;
pub use signal::{signal, Signal};
pub use transaction::{transact, Transaction};
