//! Concurrency control for the circulation engine
//!
//! Two independent, composable gates:
//! - [`AdmissionGate`]: a FIFO counting semaphore bounding how many
//!   operations are in flight at once (a fixed-size worker pool in front of
//!   constrained downstream storage)
//! - [`LoanTransactionManager`]: the atomic borrow and return transactions,
//!   executed against the storage boundary's begin/commit/rollback primitive
//!
//! The exclusive lock and condition-variable wait protocol that serialize
//! these transactions live one layer up, in the engine's coordinator; this
//! crate owns everything that does not need that lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admission;
pub mod manager;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use manager::LoanTransactionManager;
