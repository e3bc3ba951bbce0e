//! Loan transaction manager: the atomic borrow and return sequences
//!
//! Both operations run as all-or-nothing sequences inside one [`StoreTxn`],
//! so a failure partway leaves no partial state.
//!
//! ## Borrow sequence
//!
//! ```text
//! 1. inventory_for_update()  - locked read; abort Unavailable / BookNotFound
//! 2. decrement_available()   - conditional; 0 rows => abort Unavailable
//! 3. insert_loan()           - InProgress, due_at = now + loan_period
//! 4. increment_active_loans()- conditional on quota; 0 rows => QuotaExceeded
//! => commit, then re-read the populated LoanDetails
//! ```
//!
//! ## Return sequence
//!
//! ```text
//! 1. loan_for_update()       - abort LoanNotFound / LoanNotInProgress
//! 2. close_loan()            - returned_at = now, classify Returned/Overdue
//! 3. increment_available()   - 0 rows is an inventory anomaly => abort
//! 4. decrement_active_loans()- defensive floor; 0 rows is an anomaly => abort
//! => commit and return the updated LoanDetails
//! ```
//!
//! Every storage error aborts the transaction before it is surfaced as a
//! typed domain error; the undo journal restores all prior steps. Nothing is
//! retried here; the caller decides whether to resubmit.

use circ_core::{
    BookId, CircError, CircResult, CirculationPolicy, Clock, LoanDetails, LoanId, MemberId,
};
use circ_storage::LedgerStore;
use tracing::debug;

/// Executes the borrow and return transactions against the storage boundary
///
/// Holds no mutable state of its own; all state lives in the store. The
/// quota check-then-act race is closed one layer up by the coordinator's
/// exclusive lock, and closed again here by the conditional updates inside
/// the transaction.
pub struct LoanTransactionManager {
    policy: CirculationPolicy,
}

impl LoanTransactionManager {
    /// Create a manager enforcing `policy`
    pub fn new(policy: CirculationPolicy) -> Self {
        LoanTransactionManager { policy }
    }

    /// The policy this manager enforces
    pub fn policy(&self) -> &CirculationPolicy {
        &self.policy
    }

    /// Borrow one copy of `book_id` for `member_id`
    ///
    /// On success the loan is committed and returned fully populated with
    /// display data. On any failure the transaction rolls back and a typed
    /// error is returned; none of the four steps persist.
    pub fn borrow(
        &self,
        store: &LedgerStore,
        clock: &dyn Clock,
        member_id: MemberId,
        book_id: BookId,
    ) -> CircResult<LoanDetails> {
        let mut txn = store.begin();

        // Step 1: locked read of the inventory row
        let inventory = txn
            .inventory_for_update(book_id)?
            .ok_or(CircError::BookNotFound(book_id))?;
        if inventory.copies_available == 0 {
            return Err(CircError::Unavailable { book_id });
        }
        // Classify a missing member before touching any counter
        txn.member(member_id)
            .ok_or(CircError::MemberNotFound(member_id))?;

        // Step 2: conditional decrement of copies_available
        if txn.decrement_available(book_id)? == 0 {
            return Err(CircError::Unavailable { book_id });
        }

        // Step 3: insert the loan record
        let borrowed_at = clock.now();
        let loan = txn.insert_loan(book_id, member_id, borrowed_at, self.policy.loan_period)?;

        // Step 4: conditional increment of active_loans, re-checked under
        // the transaction regardless of any earlier unlocked read
        if txn.increment_active_loans(member_id, self.policy.member_quota)? == 0 {
            return Err(CircError::QuotaExceeded {
                member_id,
                quota: self.policy.member_quota,
            });
        }

        txn.commit();
        debug!(
            target: "circ::txn",
            loan_id = %loan.loan_id,
            book_id = %book_id,
            member_id = %member_id,
            due_at = %loan.due_at,
            "borrow committed"
        );

        store
            .loan_details(loan.loan_id)
            .ok_or_else(|| CircError::Storage("loan row missing after commit".to_string()))
    }

    /// Return the copy out under `loan_id`
    ///
    /// A loan that is already closed fails with `LoanNotInProgress`; the
    /// counters move only on the first, successful return.
    pub fn return_loan(
        &self,
        store: &LedgerStore,
        clock: &dyn Clock,
        loan_id: LoanId,
    ) -> CircResult<LoanDetails> {
        let mut txn = store.begin();

        // Step 1: locked read; reject closed loans
        let loan = txn
            .loan_for_update(loan_id)?
            .ok_or(CircError::LoanNotFound(loan_id))?;
        if !loan.is_in_progress() {
            return Err(CircError::LoanNotInProgress {
                loan_id,
                status: loan.status,
            });
        }

        // Step 2: close and classify
        let returned_at = clock.now();
        let status = txn.close_loan(loan_id, returned_at)?;

        // Step 3: put the copy back on the shelf
        if txn.increment_available(loan.book_id)? == 0 {
            return Err(CircError::Storage(format!(
                "inventory ceiling hit returning {}",
                loan.book_id
            )));
        }

        // Step 4: release the member's quota slot (defensive floor)
        if txn.decrement_active_loans(loan.member_id)? == 0 {
            return Err(CircError::Storage(format!(
                "active-loan floor hit returning {}",
                loan.book_id
            )));
        }

        txn.commit();
        debug!(
            target: "circ::txn",
            loan_id = %loan_id,
            status = %status,
            "return committed"
        );

        store
            .loan_details(loan_id)
            .ok_or_else(|| CircError::Storage("loan row missing after commit".to_string()))
    }
}
