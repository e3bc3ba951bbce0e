//! LedgerStore: in-memory tables with a transactional write path
//!
//! This module implements the storage boundary using:
//! - `BTreeMap` tables for books, members, and loans
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for the loan-id sequence
//!
//! # Design Notes
//!
//! - **One lock, three tables**: every transaction touches at least two
//!   tables, so the tables share a single `RwLock`. Row-level exclusivity is
//!   subsumed by the transaction holding the write guard (see [`StoreTxn`]).
//! - **Sequence values are not reclaimed**: a rolled-back transaction may
//!   consume a loan id. Gaps in the sequence are expected.
//! - **Fault points**: tests can arm a [`FaultPoint`] to make a single
//!   storage operation fail, which is how the all-or-nothing property of the
//!   transactions is verified step by step.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use circ_core::{BookId, InventoryRecord, Loan, LoanDetails, LoanId, MemberId, MemberRecord};

use crate::txn::StoreTxn;

/// A book row: the inventory counters plus catalog display metadata
///
/// The engine owns only the counters; title and author are carried so a
/// committed loan can be returned fully populated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRow {
    /// Copy counters owned by the transaction manager
    pub inventory: InventoryRecord,
    /// Catalog title (display only)
    pub title: String,
    /// Catalog author (display only)
    pub author: String,
}

/// A member row: the loan counter plus the display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRow {
    /// Active-loan counter owned by the transaction manager
    pub record: MemberRecord,
    /// Display name (display only)
    pub name: String,
}

/// The three tables behind the storage boundary
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Tables {
    pub(crate) books: BTreeMap<BookId, BookRow>,
    pub(crate) members: BTreeMap<MemberId, MemberRow>,
    pub(crate) loans: BTreeMap<LoanId, Loan>,
}

/// A point-in-time copy of all three tables
///
/// Used by tests to assert that a failed transaction left no partial state:
/// take a snapshot, run the failing transaction, take another, compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Book rows at snapshot time
    pub books: BTreeMap<BookId, BookRow>,
    /// Member rows at snapshot time
    pub members: BTreeMap<MemberId, MemberRow>,
    /// Loan rows at snapshot time
    pub loans: BTreeMap<LoanId, Loan>,
}

/// Storage operations that can be made to fail on demand
///
/// Arming a fault point makes the matching [`StoreTxn`] operation return a
/// storage error, exercising the rollback path at that exact step. The fault
/// stays armed until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Borrow step 1: locked read of the inventory row
    ReadInventory,
    /// Borrow step 2: conditional decrement of `copies_available`
    DecrementAvailable,
    /// Borrow step 3: loan insertion
    InsertLoan,
    /// Borrow step 4: conditional increment of `active_loans`
    IncrementActiveLoans,
    /// Return step 1: locked read of the loan row
    ReadLoan,
    /// Return step 2: closing the loan (status + returned_at)
    CloseLoan,
    /// Return step 3: increment of `copies_available`
    IncrementAvailable,
    /// Return step 4: conditional decrement of `active_loans`
    DecrementActiveLoans,
}

/// In-memory storage backend with a transactional write path
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`. Read-only
/// accessors take the read lock; all mutation goes through [`StoreTxn`],
/// which holds the write lock from begin to commit/rollback.
#[derive(Debug)]
pub struct LedgerStore {
    /// The tables; a StoreTxn holds the write guard for its lifetime
    tables: RwLock<Tables>,
    /// Loan-id sequence; monotonically increasing, gaps allowed
    next_loan_id: AtomicU64,
    /// Armed fault for atomicity tests; None in normal operation
    fault: Mutex<Option<FaultPoint>>,
}

impl LedgerStore {
    /// Create a new empty store
    pub fn new() -> Self {
        LedgerStore {
            tables: RwLock::new(Tables::default()),
            next_loan_id: AtomicU64::new(1),
            fault: Mutex::new(None),
        }
    }

    /// Begin a transaction
    ///
    /// Acquires the table write lock; the returned transaction rolls back on
    /// drop unless [`StoreTxn::commit`] is called.
    pub fn begin(&self) -> StoreTxn<'_> {
        StoreTxn::new(self, self.tables.write())
    }

    /// Register a book with all copies on the shelf
    ///
    /// Returns `true` if the book was newly registered, `false` if a row with
    /// this id already existed (the existing row is left untouched).
    pub fn register_book(&self, book_id: BookId, title: &str, author: &str, copies: u32) -> bool {
        let mut tables = self.tables.write();
        if tables.books.contains_key(&book_id) {
            return false;
        }
        tables.books.insert(
            book_id,
            BookRow {
                inventory: InventoryRecord::fully_stocked(book_id, copies),
                title: title.to_string(),
                author: author.to_string(),
            },
        );
        true
    }

    /// Register a member with no open loans
    ///
    /// Returns `true` if the member was newly registered, `false` if a row
    /// with this id already existed.
    pub fn register_member(&self, member_id: MemberId, name: &str) -> bool {
        let mut tables = self.tables.write();
        if tables.members.contains_key(&member_id) {
            return false;
        }
        tables.members.insert(
            member_id,
            MemberRow {
                record: MemberRecord::new(member_id),
                name: name.to_string(),
            },
        );
        true
    }

    /// Read a book row
    pub fn book(&self, book_id: BookId) -> Option<BookRow> {
        self.tables.read().books.get(&book_id).cloned()
    }

    /// Read a member row
    pub fn member(&self, member_id: MemberId) -> Option<MemberRow> {
        self.tables.read().members.get(&member_id).cloned()
    }

    /// Read a loan row
    pub fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.tables.read().loans.get(&loan_id).cloned()
    }

    /// Current available-copy count for a book, if it exists
    pub fn available_copies(&self, book_id: BookId) -> Option<u32> {
        self.tables
            .read()
            .books
            .get(&book_id)
            .map(|row| row.inventory.copies_available)
    }

    /// All loans belonging to a member, in loan-id order
    pub fn loans_for_member(&self, member_id: MemberId) -> Vec<Loan> {
        self.tables
            .read()
            .loans
            .values()
            .filter(|loan| loan.member_id == member_id)
            .cloned()
            .collect()
    }

    /// A loan joined with its denormalized book/member display data
    ///
    /// Read-only convenience used after a committed transaction; returns
    /// `None` if any referenced row is missing.
    pub fn loan_details(&self, loan_id: LoanId) -> Option<LoanDetails> {
        let tables = self.tables.read();
        let loan = tables.loans.get(&loan_id)?.clone();
        let book = tables.books.get(&loan.book_id)?;
        let member = tables.members.get(&loan.member_id)?;
        Some(LoanDetails {
            book_title: book.title.clone(),
            book_author: book.author.clone(),
            member_name: member.name.clone(),
            loan,
        })
    }

    /// Copy of all three tables for before/after comparison in tests
    pub fn snapshot(&self) -> LedgerSnapshot {
        let tables = self.tables.read();
        LedgerSnapshot {
            books: tables.books.clone(),
            members: tables.members.clone(),
            loans: tables.loans.clone(),
        }
    }

    /// Arm (or clear, with `None`) a storage fault
    ///
    /// Test support: the matching transaction operation fails with a storage
    /// error until the fault is cleared.
    pub fn inject_fault(&self, fault: Option<FaultPoint>) {
        *self.fault.lock() = fault;
    }

    /// The fault currently armed, if any
    pub(crate) fn armed_fault(&self) -> Option<FaultPoint> {
        *self.fault.lock()
    }

    /// Allocate the next loan id
    ///
    /// Called inside a transaction's insert; the sequence itself is never
    /// rolled back.
    pub(crate) fn allocate_loan_id(&self) -> LoanId {
        LoanId::new(self.next_loan_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}
