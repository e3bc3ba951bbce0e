//! Atomicity Tests
//!
//! A borrow or return that fails at any step must leave the books, members,
//! and loans tables exactly as they were: snapshot before, inject a storage
//! fault at one step, snapshot after, compare.

use crate::common::seeded_library;
use circulate::{BookId, ErrorKind, FaultPoint, LoanStatus, MemberId};

#[test]
fn borrow_fault_at_every_step_leaves_tables_unchanged() {
    let borrow_steps = [
        FaultPoint::ReadInventory,
        FaultPoint::DecrementAvailable,
        FaultPoint::InsertLoan,
        FaultPoint::IncrementActiveLoans,
    ];

    for fault in borrow_steps {
        let (library, _clock) = seeded_library();
        let before = library.store().snapshot();

        library.store().inject_fault(Some(fault));
        let err = library.borrow(MemberId::new(1), BookId::new(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure, "step {fault:?}");
        assert_eq!(
            library.store().snapshot(),
            before,
            "borrow fault at {fault:?} left partial state"
        );

        // The engine recovers as soon as the storage layer does
        library.store().inject_fault(None);
        let details = library.borrow(MemberId::new(1), BookId::new(2)).unwrap();
        assert_eq!(details.loan.status, LoanStatus::InProgress);
    }
}

#[test]
fn return_fault_at_every_step_leaves_tables_unchanged() {
    let return_steps = [
        FaultPoint::ReadLoan,
        FaultPoint::CloseLoan,
        FaultPoint::IncrementAvailable,
        FaultPoint::DecrementActiveLoans,
    ];

    for fault in return_steps {
        let (library, _clock) = seeded_library();
        let details = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();
        let before = library.store().snapshot();

        library.store().inject_fault(Some(fault));
        let err = library.return_loan(details.loan.loan_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure, "step {fault:?}");
        assert_eq!(
            library.store().snapshot(),
            before,
            "return fault at {fault:?} left partial state"
        );

        // The loan is still open and can be returned once the fault clears
        library.store().inject_fault(None);
        let returned = library.return_loan(details.loan.loan_id).unwrap();
        assert_eq!(returned.loan.status, LoanStatus::Returned);
    }
}

#[test]
fn failed_borrow_does_not_consume_a_loan_record() {
    let (library, _clock) = seeded_library();

    library.store().inject_fault(Some(FaultPoint::IncrementActiveLoans));
    library.borrow(MemberId::new(1), BookId::new(2)).unwrap_err();
    library.store().inject_fault(None);

    // No loan row survived the rollback
    assert!(library.store().snapshot().loans.is_empty());
    assert!(library.loans_for_member(MemberId::new(1)).is_empty());
}

#[test]
fn double_return_moves_counters_exactly_once() {
    let (library, _clock) = seeded_library();
    let details = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    library.return_loan(details.loan.loan_id).unwrap();
    let after_first = library.store().snapshot();

    let err = library.return_loan(details.loan.loan_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(library.store().snapshot(), after_first);
}
