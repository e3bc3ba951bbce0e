//! Operation metrics
//!
//! Lock-free attempted/succeeded/failed counters per operation category.
//!
//! # Memory Ordering
//!
//! All counters use `Relaxed` ordering intentionally:
//! 1. They are purely observational metrics for monitoring/debugging
//! 2. They do not synchronize any other memory operations
//! 3. Approximate interleavings are acceptable for metrics purposes
//!
//! Counters are incremented outside the coordinator's exclusive lock so
//! observability never contends with the critical path.

use std::sync::atomic::{AtomicU64, Ordering};

/// The operation families the engine accounts for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    /// Borrow attempts (immediate and waiting)
    Borrow,
    /// Return attempts
    Return,
    /// Read-only lookups: availability checks, loan/member queries
    Search,
}

/// One category's counter triple
#[derive(Debug, Default)]
struct Counters {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> OpStats {
        OpStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Registry of per-category counters, shared by all operations
#[derive(Debug, Default)]
pub(crate) struct OpMetrics {
    borrow: Counters,
    return_ops: Counters,
    search: Counters,
}

impl OpMetrics {
    fn counters(&self, category: OpCategory) -> &Counters {
        match category {
            OpCategory::Borrow => &self.borrow,
            OpCategory::Return => &self.return_ops,
            OpCategory::Search => &self.search,
        }
    }

    /// Count an operation entering the engine
    pub(crate) fn record_attempt(&self, category: OpCategory) {
        self.counters(category)
            .attempted
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Count an operation's outcome
    pub(crate) fn record_outcome(&self, category: OpCategory, succeeded: bool) {
        let counters = self.counters(category);
        if succeeded {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of all counters
    pub(crate) fn snapshot(&self) -> CirculationMetrics {
        CirculationMetrics {
            borrow: self.borrow.snapshot(),
            return_ops: self.return_ops.snapshot(),
            search: self.search.snapshot(),
        }
    }
}

/// Statistics for one operation category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpStats {
    /// Operations that entered the engine
    pub attempted: u64,
    /// Operations that completed successfully
    pub succeeded: u64,
    /// Operations that returned an error
    pub failed: u64,
}

impl OpStats {
    /// Success rate (succeeded / attempted), 0.0 when nothing was attempted
    pub fn success_rate(&self) -> f64 {
        if self.attempted > 0 {
            self.succeeded as f64 / self.attempted as f64
        } else {
            0.0
        }
    }
}

/// Point-in-time engine statistics
///
/// An attempted operation that has not finished yet is counted in
/// `attempted` but in neither outcome bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CirculationMetrics {
    /// Borrow counters
    pub borrow: OpStats,
    /// Return counters
    pub return_ops: OpStats,
    /// Search counters
    pub search: OpStats,
}
