//! StoreTxn: the begin/commit/rollback primitive
//!
//! A transaction holds the table write lock from `begin` until it is
//! committed, rolled back, or dropped. Holding the guard is what makes the
//! locked reads write-intent reads: no other reader or writer can observe a
//! stale count while the transaction is deciding.
//!
//! Every mutation journals an undo record before it applies. `commit`
//! discards the journal; `rollback` (or drop without commit) replays it in
//! reverse, so a failure partway leaves no partial state.
//!
//! Conditional updates return the number of affected rows. Zero means the
//! precondition (a depleted book, a member at the cap) did not hold at
//! execution time, and the caller decides whether that aborts the
//! transaction.

use parking_lot::RwLockWriteGuard;

use circ_core::{BookId, CircError, CircResult, InventoryRecord, Loan, LoanId, LoanStatus, MemberId, MemberRecord};
use chrono::{DateTime, Duration, Utc};

use crate::ledger::{FaultPoint, LedgerStore, Tables};

/// One journaled pre-image, applied in reverse order on rollback
#[derive(Debug)]
enum UndoOp {
    /// Restore a book's available-copy counter
    RestoreAvailable {
        book_id: BookId,
        copies_available: u32,
    },
    /// Restore a member's active-loan counter
    RestoreActiveLoans {
        member_id: MemberId,
        active_loans: u32,
    },
    /// Remove a loan inserted by this transaction
    RemoveLoan(LoanId),
    /// Restore a loan row to its pre-image
    RestoreLoan(Loan),
}

/// A multi-statement transaction against the ledger tables
///
/// Created by [`LedgerStore::begin`]. Dropping without committing rolls
/// back, so an early `?` return from the middle of a transaction cannot leak
/// partial writes.
pub struct StoreTxn<'a> {
    store: &'a LedgerStore,
    tables: RwLockWriteGuard<'a, Tables>,
    undo: Vec<UndoOp>,
    committed: bool,
}

impl<'a> StoreTxn<'a> {
    pub(crate) fn new(store: &'a LedgerStore, tables: RwLockWriteGuard<'a, Tables>) -> Self {
        StoreTxn {
            store,
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    /// Fail if the matching fault point is armed
    fn check_fault(&self, point: FaultPoint) -> CircResult<()> {
        if self.store.armed_fault() == Some(point) {
            return Err(CircError::Storage(format!("injected fault: {point:?}")));
        }
        Ok(())
    }

    /// Locked read of a book's inventory counters
    ///
    /// Write-intent semantics: the transaction's write guard prevents any
    /// concurrent reader from observing a stale count between this read and
    /// the updates that follow it.
    pub fn inventory_for_update(&mut self, book_id: BookId) -> CircResult<Option<InventoryRecord>> {
        self.check_fault(FaultPoint::ReadInventory)?;
        Ok(self.tables.books.get(&book_id).map(|row| row.inventory.clone()))
    }

    /// Locked read of a loan row
    pub fn loan_for_update(&mut self, loan_id: LoanId) -> CircResult<Option<Loan>> {
        self.check_fault(FaultPoint::ReadLoan)?;
        Ok(self.tables.loans.get(&loan_id).cloned())
    }

    /// Plain read of a member's counter record
    pub fn member(&self, member_id: MemberId) -> Option<MemberRecord> {
        self.tables.members.get(&member_id).map(|row| row.record.clone())
    }

    /// `UPDATE books SET available = available - 1 WHERE id = ? AND available > 0`
    ///
    /// Returns the affected-row count: 0 if the book is missing or already
    /// depleted.
    pub fn decrement_available(&mut self, book_id: BookId) -> CircResult<u64> {
        self.check_fault(FaultPoint::DecrementAvailable)?;
        match self.tables.books.get_mut(&book_id) {
            Some(row) if row.inventory.copies_available > 0 => {
                self.undo.push(UndoOp::RestoreAvailable {
                    book_id,
                    copies_available: row.inventory.copies_available,
                });
                row.inventory.copies_available -= 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    /// `UPDATE books SET available = available + 1 WHERE id = ? AND available < total`
    ///
    /// The ceiling condition mirrors the floor on the member counter: it
    /// cannot fire while the loan being returned exists, but the update
    /// reports it rather than breaking the inventory invariant.
    pub fn increment_available(&mut self, book_id: BookId) -> CircResult<u64> {
        self.check_fault(FaultPoint::IncrementAvailable)?;
        match self.tables.books.get_mut(&book_id) {
            Some(row) if row.inventory.copies_available < row.inventory.copies_total => {
                self.undo.push(UndoOp::RestoreAvailable {
                    book_id,
                    copies_available: row.inventory.copies_available,
                });
                row.inventory.copies_available += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    /// Insert a new in-progress loan, id assigned from the store's sequence
    ///
    /// The sequence itself is not transactional: an id consumed by a
    /// transaction that later rolls back is simply skipped.
    pub fn insert_loan(
        &mut self,
        book_id: BookId,
        member_id: MemberId,
        borrowed_at: DateTime<Utc>,
        loan_period: Duration,
    ) -> CircResult<Loan> {
        self.check_fault(FaultPoint::InsertLoan)?;
        let loan_id = self.store.allocate_loan_id();
        let loan = Loan::issued(loan_id, book_id, member_id, borrowed_at, loan_period);
        self.undo.push(UndoOp::RemoveLoan(loan_id));
        self.tables.loans.insert(loan_id, loan.clone());
        Ok(loan)
    }

    /// `UPDATE members SET active = active + 1 WHERE id = ? AND active < quota`
    ///
    /// Returns 0 affected rows if the member is missing or already at the
    /// cap. The cap is checked here, inside the transaction, regardless of
    /// any earlier unlocked read.
    pub fn increment_active_loans(&mut self, member_id: MemberId, quota: u32) -> CircResult<u64> {
        self.check_fault(FaultPoint::IncrementActiveLoans)?;
        match self.tables.members.get_mut(&member_id) {
            Some(row) if row.record.active_loans < quota => {
                self.undo.push(UndoOp::RestoreActiveLoans {
                    member_id,
                    active_loans: row.record.active_loans,
                });
                row.record.active_loans += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    /// `UPDATE members SET active = active - 1 WHERE id = ? AND active > 0`
    ///
    /// Defensive floor: cannot fire while the member's loan exists, but the
    /// update reports it instead of underflowing.
    pub fn decrement_active_loans(&mut self, member_id: MemberId) -> CircResult<u64> {
        self.check_fault(FaultPoint::DecrementActiveLoans)?;
        match self.tables.members.get_mut(&member_id) {
            Some(row) if row.record.active_loans > 0 => {
                self.undo.push(UndoOp::RestoreActiveLoans {
                    member_id,
                    active_loans: row.record.active_loans,
                });
                row.record.active_loans -= 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    /// Close a loan: set `returned_at`, classify `Returned` vs `Overdue`
    ///
    /// Fails `InvalidState` if the loan is already terminal; the state check
    /// happens here, on the row, not on any earlier copy.
    pub fn close_loan(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> CircResult<LoanStatus> {
        self.check_fault(FaultPoint::CloseLoan)?;
        let loan = self
            .tables
            .loans
            .get_mut(&loan_id)
            .ok_or(CircError::LoanNotFound(loan_id))?;
        self.undo.push(UndoOp::RestoreLoan(loan.clone()));
        loan.close(returned_at)
    }

    /// Commit: keep every journaled write, release the table lock
    pub fn commit(mut self) {
        tracing::trace!(target: "circ::store", writes = self.undo.len(), "transaction committed");
        self.undo.clear();
        self.committed = true;
    }

    /// Roll back: undo every journaled write, release the table lock
    pub fn rollback(mut self) {
        self.undo_all();
        self.committed = true;
    }

    fn undo_all(&mut self) {
        if !self.undo.is_empty() {
            tracing::debug!(target: "circ::store", writes = self.undo.len(), "rolling back transaction");
        }
        while let Some(op) = self.undo.pop() {
            match op {
                UndoOp::RestoreAvailable {
                    book_id,
                    copies_available,
                } => {
                    if let Some(row) = self.tables.books.get_mut(&book_id) {
                        row.inventory.copies_available = copies_available;
                    }
                }
                UndoOp::RestoreActiveLoans {
                    member_id,
                    active_loans,
                } => {
                    if let Some(row) = self.tables.members.get_mut(&member_id) {
                        row.record.active_loans = active_loans;
                    }
                }
                UndoOp::RemoveLoan(loan_id) => {
                    self.tables.loans.remove(&loan_id);
                }
                UndoOp::RestoreLoan(loan) => {
                    self.tables.loans.insert(loan.loan_id, loan);
                }
            }
        }
    }
}

impl Drop for StoreTxn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.undo_all();
        }
    }
}
