//! Circulation policy knobs
//!
//! This module defines the configurable limits enforced by the engine: the
//! loan period, the per-member active-loan quota, and the admission bound on
//! concurrent operations. Defaults match standard library practice; custom
//! policies can be set at engine construction time.

use chrono::{DateTime, Duration, Utc};

/// Default loan period in days
pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;

/// Default cap on simultaneously active loans per member
pub const DEFAULT_MEMBER_QUOTA: u32 = 5;

/// Default number of concurrently admitted operations
pub const DEFAULT_ADMISSION_PERMITS: usize = 5;

/// Limits enforced by the circulation engine
///
/// Violations surface as typed errors (`QuotaExceeded`, `Unavailable`);
/// nothing is clamped silently.
#[derive(Debug, Clone)]
pub struct CirculationPolicy {
    /// How long a member may keep a copy before it is overdue
    pub loan_period: Duration,

    /// Maximum simultaneously active loans per member
    pub member_quota: u32,

    /// Permits in the admission semaphore (concurrent in-flight operations)
    pub admission_permits: usize,
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        CirculationPolicy {
            loan_period: Duration::days(DEFAULT_LOAN_PERIOD_DAYS),
            member_quota: DEFAULT_MEMBER_QUOTA,
            admission_permits: DEFAULT_ADMISSION_PERMITS,
        }
    }
}

impl CirculationPolicy {
    /// Policy with a different admission bound, other knobs default
    ///
    /// Useful for tests that need to observe the admission gate with a small
    /// permit count.
    pub fn with_admission_permits(permits: usize) -> Self {
        CirculationPolicy {
            admission_permits: permits,
            ..Default::default()
        }
    }

    /// Compute the due date for a loan issued at `borrowed_at`
    pub fn due_date(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + self.loan_period
    }
}
