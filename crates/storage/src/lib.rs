//! Storage boundary for the circulation engine
//!
//! This crate simulates the storage layer the loan transaction manager runs
//! against: three tables (books, members, loans) behind one lock, a
//! begin/commit/rollback transaction primitive, write-intent locked reads,
//! conditional updates that report affected-row counts, and an auto-assigned
//! loan-id sequence.
//!
//! All state is in-memory: ordered maps guarded by `parking_lot::RwLock`,
//! with an `AtomicU64` sequence for loan ids. A [`StoreTxn`] holds the table
//! write lock for its whole lifetime, which is what gives its reads
//! write-intent (`SELECT ... FOR UPDATE`) semantics. Mutations are journaled
//! and undone on rollback, or on drop if the transaction is neither
//! committed nor rolled back explicitly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ledger;
pub mod txn;

pub use ledger::{BookRow, FaultPoint, LedgerSnapshot, LedgerStore, MemberRow};
pub use txn::StoreTxn;
