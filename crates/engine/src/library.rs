//! Library facade: the caller-facing surface of the circulation engine
//!
//! Composes the two independent gates of the concurrency model:
//! 1. every operation first takes an admission permit (bounded worker pool),
//! 2. borrow/return/availability then enter the coordinator's exclusive
//!    lock.
//!
//! Metrics are recorded outside both gates. Registration of books and
//! members is the minimal collaborator surface the engine needs from the
//! catalog and member registry; everything else about those records lives
//! outside this core.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use circ_concurrency::AdmissionGate;
use circ_core::{
    BookId, CircResult, CirculationPolicy, Clock, Loan, LoanDetails, LoanId, MemberId, SystemClock,
};
use circ_storage::LedgerStore;

use crate::coordinator::{CancelToken, CirculationCoordinator};
use crate::metrics::{CirculationMetrics, OpCategory, OpMetrics};

/// The circulation engine behind one admission gate and one exclusive lock
///
/// # Example
///
/// ```
/// use circ_engine::Library;
/// use circ_core::{BookId, MemberId};
///
/// let library = Library::new();
/// library.register_book(BookId::new(1), "Dune", "Frank Herbert", 2);
/// library.register_member(MemberId::new(1), "Ada");
///
/// let details = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();
/// library.return_loan(details.loan.loan_id).unwrap();
/// ```
pub struct Library {
    store: Arc<LedgerStore>,
    coordinator: CirculationCoordinator,
    gate: AdmissionGate,
    metrics: OpMetrics,
}

impl Library {
    /// Engine with default policy and the system clock
    pub fn new() -> Self {
        Self::with_policy(CirculationPolicy::default())
    }

    /// Engine with a custom policy and the system clock
    pub fn with_policy(policy: CirculationPolicy) -> Self {
        Self::with_policy_and_clock(policy, Arc::new(SystemClock))
    }

    /// Engine with a custom policy and clock (tests inject a manual clock)
    pub fn with_policy_and_clock(policy: CirculationPolicy, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(LedgerStore::new());
        let gate = AdmissionGate::new(policy.admission_permits);
        let coordinator = CirculationCoordinator::new(Arc::clone(&store), clock, policy);
        Library {
            store,
            coordinator,
            gate,
            metrics: OpMetrics::default(),
        }
    }

    // ------------------------------------------------------------------
    // Collaborator surface: catalog and member registry
    // ------------------------------------------------------------------

    /// Register a book with all copies on the shelf
    ///
    /// Returns `false` (leaving the row untouched) if the id is taken.
    pub fn register_book(&self, book_id: BookId, title: &str, author: &str, copies: u32) -> bool {
        self.store.register_book(book_id, title, author, copies)
    }

    /// Register a member with no open loans
    pub fn register_member(&self, member_id: MemberId, name: &str) -> bool {
        self.store.register_member(member_id, name)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Borrow one copy of `book_id` for `member_id`, failing if none is free
    pub fn borrow(&self, member_id: MemberId, book_id: BookId) -> CircResult<LoanDetails> {
        self.metrics.record_attempt(OpCategory::Borrow);
        let result = {
            let _permit = self.gate.acquire();
            self.coordinator.borrow(member_id, book_id)
        };
        self.metrics.record_outcome(OpCategory::Borrow, result.is_ok());
        if let Err(err) = &result {
            warn!(target: "circ::txn", %member_id, %book_id, error = %err, "borrow failed");
        }
        result
    }

    /// Borrow, waiting up to `timeout` for a copy to come back
    pub fn borrow_with_wait(
        &self,
        member_id: MemberId,
        book_id: BookId,
        timeout: Duration,
    ) -> CircResult<LoanDetails> {
        self.borrow_with_wait_cancellable(member_id, book_id, timeout, None)
    }

    /// Borrow with wait, abortable through a [`CancelToken`]
    pub fn borrow_with_wait_cancellable(
        &self,
        member_id: MemberId,
        book_id: BookId,
        timeout: Duration,
        cancel: Option<&CancelToken>,
    ) -> CircResult<LoanDetails> {
        self.metrics.record_attempt(OpCategory::Borrow);
        let result = {
            // The permit is held for the whole wait: a parked borrower is
            // still in flight from the pool's perspective.
            let _permit = self.gate.acquire();
            self.coordinator
                .borrow_with_wait(member_id, book_id, timeout, cancel)
        };
        self.metrics.record_outcome(OpCategory::Borrow, result.is_ok());
        result
    }

    /// Return the copy out under `loan_id`
    pub fn return_loan(&self, loan_id: LoanId) -> CircResult<LoanDetails> {
        self.metrics.record_attempt(OpCategory::Return);
        let result = {
            let _permit = self.gate.acquire();
            self.coordinator.return_loan(loan_id)
        };
        self.metrics.record_outcome(OpCategory::Return, result.is_ok());
        result
    }

    /// Whether the book has at least one available copy
    pub fn is_available(&self, book_id: BookId) -> CircResult<bool> {
        self.metrics.record_attempt(OpCategory::Search);
        let result = {
            let _permit = self.gate.acquire();
            self.coordinator.is_available(book_id)
        };
        self.metrics.record_outcome(OpCategory::Search, result.is_ok());
        result
    }

    /// A loan joined with its display data
    ///
    /// Read-only: takes an admission permit but not the exclusive lock.
    pub fn loan_details(&self, loan_id: LoanId) -> CircResult<LoanDetails> {
        self.metrics.record_attempt(OpCategory::Search);
        let result = {
            let _permit = self.gate.acquire();
            self.store
                .loan_details(loan_id)
                .ok_or(circ_core::CircError::LoanNotFound(loan_id))
        };
        self.metrics.record_outcome(OpCategory::Search, result.is_ok());
        result
    }

    /// All loans ever issued to a member, in loan-id order
    pub fn loans_for_member(&self, member_id: MemberId) -> Vec<Loan> {
        self.metrics.record_attempt(OpCategory::Search);
        let loans = {
            let _permit = self.gate.acquire();
            self.store.loans_for_member(member_id)
        };
        self.metrics.record_outcome(OpCategory::Search, true);
        loans
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Admission permits currently free
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// Threads parked in `borrow_with_wait`
    pub fn pending_waiters(&self) -> usize {
        self.coordinator.pending_waiters()
    }

    /// Operations queued at the admission gate, not yet admitted
    pub fn pending_admissions(&self) -> usize {
        self.gate.waiting()
    }

    /// Whether the exclusive lock is held right now
    pub fn is_lock_held(&self) -> bool {
        self.coordinator.is_lock_held()
    }

    /// Point-in-time operation counters
    pub fn metrics(&self) -> CirculationMetrics {
        self.metrics.snapshot()
    }

    /// Mint a token that can cancel a waiting borrow
    pub fn cancel_token(&self) -> CancelToken {
        self.coordinator.cancel_token()
    }

    /// Direct access to the storage boundary (read-only use expected)
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}
