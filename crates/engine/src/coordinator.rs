//! Circulation coordinator: exclusive lock and wait-for-availability
//!
//! One process-wide mutex guards every borrow/return/availability entry
//! point. The storage layer's locked reads already prevent double-allocation
//! at the row level; this coarser lock additionally serializes the
//! member-quota check-then-act sequence, which otherwise races (two threads
//! both observing `active_loans = 4` and both borrowing).
//!
//! ## Wait protocol
//!
//! `borrow_with_wait` parks on a condition variable while the book has no
//! available copies. Waiting releases the lock for the duration of the park;
//! every successful return broadcasts to all waiters, and each woken thread
//! re-acquires the lock and re-validates availability, its deadline, and its
//! cancellation flag before acting. The re-check loop is load-bearing:
//! wakeups can be spurious, and several waiters may be competing for a
//! single freed copy, and whichever re-acquires the lock first and passes
//! validation wins.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use circ_concurrency::LoanTransactionManager;
use circ_core::{
    BookId, CircError, CircResult, CirculationPolicy, Clock, LoanDetails, LoanId, MemberId,
};
use circ_storage::LedgerStore;

/// Cancels a wait in progress
///
/// Minted by [`CirculationCoordinator::cancel_token`]; `cancel` sets the
/// flag and broadcasts the coordinator's condition variable so the parked
/// thread wakes promptly. Other waiters woken by the same broadcast simply
/// re-validate and park again.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    signal: Arc<Condvar>,
}

impl CancelToken {
    /// Request cancellation and wake the waiting thread
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.signal.notify_all();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Serializes borrow/return critical sections and manages waiting borrowers
pub struct CirculationCoordinator {
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    manager: LoanTransactionManager,
    /// The process-wide exclusive lock for this core
    exclusive: Mutex<()>,
    /// Signaled (broadcast) after every successful return
    availability: Arc<Condvar>,
    /// Threads currently parked in `borrow_with_wait` (diagnostic)
    waiters: AtomicUsize,
}

impl CirculationCoordinator {
    /// Create a coordinator over `store`, stamping time from `clock`
    pub fn new(store: Arc<LedgerStore>, clock: Arc<dyn Clock>, policy: CirculationPolicy) -> Self {
        CirculationCoordinator {
            store,
            clock,
            manager: LoanTransactionManager::new(policy),
            exclusive: Mutex::new(()),
            availability: Arc::new(Condvar::new()),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Borrow immediately, failing `Unavailable` if no copy is free
    ///
    /// The lock is released on every exit path by guard drop.
    pub fn borrow(&self, member_id: MemberId, book_id: BookId) -> CircResult<LoanDetails> {
        let _serial = self.exclusive.lock();
        self.manager
            .borrow(&self.store, &*self.clock, member_id, book_id)
    }

    /// Borrow, waiting up to `timeout` for a copy to be returned
    ///
    /// Fails fast, without waiting, on an unknown book or member, or a
    /// member already at quota. While the book is depleted the thread parks
    /// on the condition variable (releasing the lock); on every wake it
    /// re-checks cancellation, availability, and the remaining deadline.
    /// Availability observed at wake time is only a hint: the borrow
    /// transaction re-validates everything.
    pub fn borrow_with_wait(
        &self,
        member_id: MemberId,
        book_id: BookId,
        timeout: Duration,
        cancel: Option<&CancelToken>,
    ) -> CircResult<LoanDetails> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut guard = self.exclusive.lock();

        // Validate up front so impossible requests fail instead of waiting
        if self.store.book(book_id).is_none() {
            return Err(CircError::BookNotFound(book_id));
        }
        let member = self
            .store
            .member(member_id)
            .ok_or(CircError::MemberNotFound(member_id))?;
        let quota = self.manager.policy().member_quota;
        if member.record.active_loans >= quota {
            return Err(CircError::QuotaExceeded { member_id, quota });
        }

        loop {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                debug!(target: "circ::wait", %member_id, %book_id, "wait cancelled");
                return Err(CircError::Cancelled);
            }
            if self.store.available_copies(book_id).unwrap_or(0) > 0 {
                return self
                    .manager
                    .borrow(&self.store, &*self.clock, member_id, book_id);
            }
            if Instant::now() >= deadline {
                let waited_ms = started.elapsed().as_millis() as u64;
                debug!(target: "circ::wait", %member_id, %book_id, waited_ms, "wait timed out");
                return Err(CircError::WaitTimedOut { book_id, waited_ms });
            }

            trace!(target: "circ::wait", %member_id, %book_id, "parking until a copy returns");
            self.waiters.fetch_add(1, Ordering::SeqCst);
            let _ = self.availability.wait_until(&mut guard, deadline);
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            // Woken by a return, a cancellation, the deadline, or spuriously;
            // the top of the loop decides which.
        }
    }

    /// Return a loan, then broadcast-wake every parked borrower
    ///
    /// All waiters are woken, not just one: each must re-validate
    /// availability and its own quota, since several may be competing for
    /// the one freed copy.
    pub fn return_loan(&self, loan_id: LoanId) -> CircResult<LoanDetails> {
        let guard = self.exclusive.lock();
        let result = self.manager.return_loan(&self.store, &*self.clock, loan_id);
        if result.is_ok() {
            self.availability.notify_all();
        }
        drop(guard);
        if let Err(err) = &result {
            warn!(target: "circ::txn", %loan_id, error = %err, "return failed");
        }
        result
    }

    /// Whether the book currently has at least one available copy
    pub fn is_available(&self, book_id: BookId) -> CircResult<bool> {
        let _serial = self.exclusive.lock();
        self.store
            .available_copies(book_id)
            .map(|copies| copies > 0)
            .ok_or(CircError::BookNotFound(book_id))
    }

    /// Mint a token that can cancel a `borrow_with_wait` in progress
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            signal: Arc::clone(&self.availability),
        }
    }

    /// Threads currently parked waiting for availability (diagnostic)
    pub fn pending_waiters(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    /// Whether the exclusive lock is held right now (diagnostic)
    pub fn is_lock_held(&self) -> bool {
        self.exclusive.is_locked()
    }

    /// The store this coordinator runs against
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// The policy enforced by the underlying transaction manager
    pub fn policy(&self) -> &CirculationPolicy {
        self.manager.policy()
    }
}
