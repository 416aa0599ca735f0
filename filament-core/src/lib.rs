//! Filament Core
//!
//! This crate provides the core engine for Filament's fine-grained reactive
//! state: observable cells, derived values, side-effecting observers, and
//! transactions with rollback.
//!
//! # Architecture
//!
//! - `reactive`: signals, computed cells, effects, transactions, and the
//!   dependency-tracking machinery behind them
//! - `error`: the public error type
//!
//! All propagation is synchronous and push-based: a write returns only after
//! every dependent computed has recomputed and every due effect has run.
//! Tracking and transaction state is thread-local, so each thread hosts an
//! independent reactive graph.
//!
//! # Example
//!
//! ```
//! use filament_core::{computed, signal, transact};
//!
//! let count = signal(0);
//!
//! let doubled = computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! count.set(5).unwrap();
//! assert_eq!(doubled.get(), 10);
//!
//! // Roll a batch of writes back as if they never happened.
//! let result: Result<(), &str> = transact(|_| {
//!     count.set(100).unwrap();
//!     Err("changed my mind")
//! });
//! assert!(result.is_err());
//! assert_eq!(count.get(), 5);
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod error;
pub mod reactive;

pub use error::Error;
pub use reactive::{computed, effect, signal, transact, ListenerId, Signal, Transaction};
