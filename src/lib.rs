//! Circulate - loan transaction and concurrency-control engine
//!
//! Circulate is the circulation core of a library-management backend: it
//! moves a book from "on the shelf" to "on loan" and back, safely, under
//! concurrent access from multiple callers.
//!
//! # Quick Start
//!
//! ```
//! use circulate::{BookId, Library, MemberId};
//!
//! let library = Library::new();
//! library.register_book(BookId::new(1), "Dune", "Frank Herbert", 2);
//! library.register_member(MemberId::new(1), "Ada");
//!
//! let details = library.borrow(MemberId::new(1), BookId::new(1)).unwrap();
//! assert!(details.loan.is_in_progress());
//! library.return_loan(details.loan.loan_id).unwrap();
//! ```
//!
//! # Architecture
//!
//! Every operation passes through two independent gates: the admission
//! semaphore ([`AdmissionGate`], bounding total in-flight operations), then
//! for borrow/return/availability the coordinator's exclusive lock
//! ([`CirculationCoordinator`], serializing the critical section). The
//! atomic borrow and return transactions themselves run inside the storage
//! boundary's begin/commit/rollback primitive ([`LedgerStore`]).
//!
//! The [`Library`] struct provides the high-level interface; the layer
//! crates are re-exported for callers that need to compose the pieces
//! themselves.

pub use circ_core::{
    BookId, CircError, CircResult, CirculationPolicy, Clock, ErrorKind, InventoryRecord, Loan,
    LoanDetails, LoanId, LoanStatus, ManualClock, MemberId, MemberRecord, SystemClock,
};

pub use circ_storage::{BookRow, FaultPoint, LedgerSnapshot, LedgerStore, MemberRow, StoreTxn};

pub use circ_concurrency::{AdmissionGate, AdmissionPermit, LoanTransactionManager};

pub use circ_engine::{
    CancelToken, CirculationCoordinator, CirculationMetrics, Library, OpCategory, OpStats,
};
