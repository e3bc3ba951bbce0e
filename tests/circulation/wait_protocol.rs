//! Wait-for-Availability Protocol Tests
//!
//! Waiters must wake after a return, re-validate (several may be competing
//! for one freed copy), time out within a bounded margin, and honor
//! cancellation.

use crate::common::seeded_library;
use circulate::{BookId, CircError, ErrorKind, MemberId};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn waiter_borrows_after_concurrent_return() {
    let (library, _clock) = seeded_library();
    let library = Arc::new(library);
    let holder = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    let waiter = {
        let library = Arc::clone(&library);
        thread::spawn(move || {
            library.borrow_with_wait(MemberId::new(2), BookId::new(1), Duration::from_secs(10))
        })
    };

    while library.pending_waiters() == 0 {
        thread::yield_now();
    }
    library.return_loan(holder.loan.loan_id).unwrap();

    let details = waiter.join().unwrap().unwrap();
    assert_eq!(details.loan.member_id, MemberId::new(2));
    assert_eq!(library.store().available_copies(BookId::new(1)), Some(0));
    assert_eq!(library.pending_waiters(), 0);
}

#[test]
fn timeout_is_bounded_and_reported_as_unavailable() {
    let (library, _clock) = seeded_library();
    library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    let requested = Duration::from_millis(80);
    let started = Instant::now();
    let err = library
        .borrow_with_wait(MemberId::new(2), BookId::new(1), requested)
        .unwrap_err();
    let waited = started.elapsed();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(matches!(err, CircError::WaitTimedOut { .. }));
    assert!(waited >= requested, "returned before the requested timeout");
    assert!(
        waited < requested + Duration::from_secs(2),
        "wait ran unboundedly past the deadline"
    );
}

#[test]
fn broadcast_wakes_all_but_one_copy_admits_one() {
    const WAITERS: usize = 3;

    let (library, _clock) = seeded_library();
    let library = Arc::new(library);
    let holder = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    // Extra members so each waiter has its own quota
    for m in 20..(20 + WAITERS as u64) {
        library.register_member(MemberId::new(m), "Waiting Reader");
    }

    let barrier = Arc::new(Barrier::new(WAITERS));
    let handles: Vec<_> = (0..WAITERS)
        .map(|i| {
            let library = Arc::clone(&library);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                library.borrow_with_wait(
                    MemberId::new(20 + i as u64),
                    BookId::new(1),
                    Duration::from_millis(500),
                )
            })
        })
        .collect();

    while library.pending_waiters() < WAITERS {
        thread::yield_now();
    }

    // One copy comes back; every waiter wakes, exactly one wins it
    library.return_loan(holder.loan.loan_id).unwrap();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let timed_out = results
        .iter()
        .filter(|r| matches!(r, Err(CircError::WaitTimedOut { .. })))
        .count();

    assert_eq!(winners, 1, "one freed copy admits exactly one waiter");
    assert_eq!(timed_out, WAITERS - 1, "losers re-validate and time out");
    assert_eq!(library.store().available_copies(BookId::new(1)), Some(0));
}

#[test]
fn cancellation_unparks_without_a_loan() {
    let (library, _clock) = seeded_library();
    let library = Arc::new(library);
    library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    let token = library.cancel_token();
    let waiter = {
        let library = Arc::clone(&library);
        let token = token.clone();
        thread::spawn(move || {
            library.borrow_with_wait_cancellable(
                MemberId::new(2),
                BookId::new(1),
                Duration::from_secs(30),
                Some(&token),
            )
        })
    };

    while library.pending_waiters() == 0 {
        thread::yield_now();
    }
    token.cancel();

    let err = waiter.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(library.pending_waiters(), 0);
    assert!(!library.is_lock_held());
    assert_eq!(library.available_permits(), 5);
    assert_eq!(
        library.store().member(MemberId::new(2)).unwrap().record.active_loans,
        0
    );
}

#[test]
fn wait_fails_fast_without_parking_on_bad_input() {
    let (library, _clock) = seeded_library();
    library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    let started = Instant::now();
    let err = library
        .borrow_with_wait(MemberId::new(404), BookId::new(1), Duration::from_secs(10))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(started.elapsed() < Duration::from_secs(1), "must not wait");
}
