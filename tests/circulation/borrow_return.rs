//! End-to-End Borrow/Return Scenarios
//!
//! The two full walkthroughs: the single-copy lifecycle (borrow, contend,
//! return on day 10, double return) and the quota ceiling.

use crate::common::{opening_day, seeded_library};
use chrono::Duration;
use circulate::{BookId, CircError, ErrorKind, LoanStatus, MemberId};

// ============================================================================
// Scenario: single copy, full lifecycle
// ============================================================================

#[test]
fn single_copy_lifecycle() {
    let (library, clock) = seeded_library();
    let book = BookId::new(1);
    let ada = MemberId::new(1);
    let grace = MemberId::new(2);

    // Borrow succeeds and moves both counters
    let details = library.borrow(ada, book).unwrap();
    assert_eq!(details.loan.status, LoanStatus::InProgress);
    assert_eq!(details.loan.borrowed_at, opening_day());
    assert_eq!(details.loan.due_at, opening_day() + Duration::days(14));
    assert_eq!(details.book_title, "A Wizard of Earthsea");
    assert_eq!(details.member_name, "Ada Lovelace");
    assert_eq!(library.store().available_copies(book), Some(0));
    assert_eq!(
        library.store().member(ada).unwrap().record.active_loans,
        1
    );

    // A second borrow for a different member finds the shelf empty
    let err = library.borrow(grace, book).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    // Day 10 of a 14-day loan: an on-time return
    clock.advance(Duration::days(10));
    let returned = library.return_loan(details.loan.loan_id).unwrap();
    assert_eq!(returned.loan.status, LoanStatus::Returned);
    assert_eq!(
        returned.loan.returned_at,
        Some(opening_day() + Duration::days(10))
    );
    assert_eq!(library.store().available_copies(book), Some(1));
    assert_eq!(
        library.store().member(ada).unwrap().record.active_loans,
        0
    );

    // Returning the same loan again fails cleanly
    let err = library.return_loan(details.loan.loan_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(library.store().available_copies(book), Some(1));
}

#[test]
fn late_return_closes_overdue() {
    let (library, clock) = seeded_library();
    let details = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    clock.advance(Duration::days(20));
    let returned = library.return_loan(details.loan.loan_id).unwrap();
    assert_eq!(returned.loan.status, LoanStatus::Overdue);
    // Overdue is terminal too: counters already moved, a retry fails
    let err = library.return_loan(details.loan.loan_id).unwrap_err();
    assert!(matches!(err, CircError::LoanNotInProgress { .. }));
}

// ============================================================================
// Scenario: member at quota
// ============================================================================

#[test]
fn member_at_quota_cannot_borrow_and_availability_is_untouched() {
    let (library, _clock) = seeded_library();
    library.register_book(BookId::new(9), "Foundation", "Isaac Asimov", 10);
    let ada = MemberId::new(1);

    for _ in 0..5 {
        library.borrow(ada, BookId::new(9)).unwrap();
    }
    let available_before = library.store().available_copies(BookId::new(2)).unwrap();

    let err = library.borrow(ada, BookId::new(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    assert_eq!(
        library.store().available_copies(BookId::new(2)),
        Some(available_before)
    );
    assert_eq!(
        library.store().member(ada).unwrap().record.active_loans,
        5
    );

    // Returning one loan frees a quota slot
    let loans = library.loans_for_member(ada);
    library.return_loan(loans[0].loan_id).unwrap();
    library.borrow(ada, BookId::new(2)).unwrap();
}

// ============================================================================
// Rest-state invariants
// ============================================================================

#[test]
fn counters_hold_invariants_after_mixed_traffic() {
    let (library, _clock) = seeded_library();

    // Drive a burst of successes and failures through every entry point
    for round in 0..4u64 {
        for member in 1..=3u64 {
            let _ = library.borrow(MemberId::new(member), BookId::new(2));
        }
        let _ = library.borrow(MemberId::new(1), BookId::new(1));
        let _ = library.is_available(BookId::new(1));
        for loan in library.loans_for_member(MemberId::new(round % 3 + 1)) {
            let _ = library.return_loan(loan.loan_id);
        }
    }

    let snapshot = library.store().snapshot();
    for row in snapshot.books.values() {
        assert!(row.inventory.invariants_hold(), "inventory out of range");
    }
    for row in snapshot.members.values() {
        assert!(row.record.active_loans <= 5, "quota exceeded at rest");
    }
    assert!(!library.is_lock_held());
    assert_eq!(library.pending_waiters(), 0);
}
