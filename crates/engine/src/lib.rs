//! Circulation engine: coordination and facade
//!
//! This crate assembles the pieces below it into the caller-facing engine:
//! - [`CirculationCoordinator`]: the process-wide exclusive lock, the
//!   condition-variable wait-for-availability protocol, and broadcast wake
//!   on return
//! - [`Library`]: the facade composing the admission gate (outer bound on
//!   in-flight operations) with the coordinator (inner critical section),
//!   plus registration, lookups, metrics, and diagnostics
//!
//! The two gates are independent: a caller first takes an admission permit,
//! then, for borrow/return/availability, the exclusive lock. A thread
//! parked waiting for availability releases the lock but keeps its permit;
//! it is still in flight from the pool's perspective.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod library;
pub mod metrics;

pub use coordinator::{CancelToken, CirculationCoordinator};
pub use library::Library;
pub use metrics::{CirculationMetrics, OpCategory, OpStats};
