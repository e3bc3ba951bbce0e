//! Admission Bound Tests
//!
//! The admission gate caps in-flight operations independently of the
//! exclusive lock: with N=2 permits and five concurrent operations, at most
//! two are ever past the gate at once.

use crate::common::seeded_library_with_policy;
use circulate::{AdmissionGate, BookId, CirculationPolicy, MemberId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn five_operations_two_permits_peak_at_most_two() {
    const PERMITS: usize = 2;
    const OPS: usize = 5;

    // Instrument the gate directly: enter/leave counters around the held
    // permit are exactly the "critical section" of the pool.
    let gate = Arc::new(AdmissionGate::new(PERMITS));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(OPS));

    let handles: Vec<_> = (0..OPS)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let _permit = gate.acquire();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(15));
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= PERMITS);
    assert_eq!(gate.available_permits(), PERMITS);
    assert_eq!(gate.waiting(), 0);
}

#[test]
fn parked_waiters_keep_their_permits() {
    const PERMITS: usize = 2;

    let (library, _clock) =
        seeded_library_with_policy(CirculationPolicy::with_admission_permits(PERMITS));
    let library = Arc::new(library);
    let holder = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();

    for m in 30..33u64 {
        library.register_member(MemberId::new(m), "Queued Reader");
    }

    // Two waiting borrows take both permits and park on the condvar
    let token = library.cancel_token();
    let parked: Vec<_> = (0..2u64)
        .map(|i| {
            let library = Arc::clone(&library);
            let token = token.clone();
            thread::spawn(move || {
                library.borrow_with_wait_cancellable(
                    MemberId::new(30 + i),
                    BookId::new(1),
                    Duration::from_secs(10),
                    Some(&token),
                )
            })
        })
        .collect();
    while library.pending_waiters() < PERMITS {
        thread::yield_now();
    }

    // A third caller cannot even reach the condvar: it queues at the gate,
    // because the parked waiters are still in flight from the pool's view
    let queued = {
        let library = Arc::clone(&library);
        thread::spawn(move || {
            library.borrow_with_wait(MemberId::new(32), BookId::new(1), Duration::from_secs(10))
        })
    };
    while library.pending_admissions() == 0 {
        thread::yield_now();
    }
    assert_eq!(library.pending_waiters(), PERMITS);
    assert_eq!(library.available_permits(), 0);
    assert_eq!(library.pending_admissions(), 1);

    // Cancelling the parked pair frees their permits; the queued caller is
    // admitted, parks, and wins the copy once it comes back
    token.cancel();
    for handle in parked {
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), circulate::ErrorKind::Cancelled);
    }
    while library.pending_waiters() == 0 {
        thread::yield_now();
    }
    library.return_loan(holder.loan.loan_id).unwrap();

    let details = queued.join().unwrap().unwrap();
    assert_eq!(details.loan.member_id, MemberId::new(32));
    assert_eq!(library.available_permits(), PERMITS);
    assert_eq!(library.pending_admissions(), 0);
}

#[test]
fn try_acquire_respects_the_queue() {
    let gate = AdmissionGate::new(1);
    let held = gate.acquire();

    // Nothing free: try_acquire must not block and must not succeed
    assert!(gate.try_acquire().is_none());
    drop(held);
    let reacquired = gate.try_acquire();
    assert!(reacquired.is_some());
}
