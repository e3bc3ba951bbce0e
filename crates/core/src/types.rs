//! Identity newtypes and the three record types of the circulation core
//!
//! The engine owns exactly three pieces of mutable shared state:
//! - `InventoryRecord`: per-book copy counters
//! - `MemberRecord`: per-member active-loan counter
//! - `Loan`: the record of one borrowing, with its state machine
//!
//! All three are mutated only by the loan transaction manager; every other
//! component reads.

use crate::error::{CircError, CircResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a book title in the catalog
///
/// Identity is immutable once created. Assigned by the catalog (an external
/// collaborator); this core only checks validity and owns the copy counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookId(u64);

impl BookId {
    /// Create a BookId from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value of this BookId
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "book:{}", self.0)
    }
}

/// Identifier for a registered library member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(u64);

impl MemberId {
    /// Create a MemberId from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value of this MemberId
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member:{}", self.0)
    }
}

/// Identifier for a loan record
///
/// Assigned by the storage layer's sequence when the borrow transaction
/// inserts the record. Never reused; sequence values consumed by rolled-back
/// transactions are not reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoanId(u64);

impl LoanId {
    /// Create a LoanId from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value of this LoanId
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loan:{}", self.0)
    }
}

/// Loan state machine
///
/// ```text
/// InProgress ──(returned on or before due date)──▶ Returned
///      └──────(returned after due date)──────────▶ Overdue
/// ```
///
/// `Returned` and `Overdue` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// Loan is open; the copy is out with the member
    InProgress,
    /// Terminal: returned on or before the due date
    Returned,
    /// Terminal: returned after the due date
    Overdue,
}

impl LoanStatus {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Overdue)
    }

    /// Classify a return: late returns close as `Overdue`, on-time as `Returned`
    pub fn classify_return(returned_at: DateTime<Utc>, due_at: DateTime<Utc>) -> Self {
        if returned_at > due_at {
            LoanStatus::Overdue
        } else {
            LoanStatus::Returned
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::InProgress => write!(f, "in-progress"),
            LoanStatus::Returned => write!(f, "returned"),
            LoanStatus::Overdue => write!(f, "overdue"),
        }
    }
}

/// The record of one member borrowing one book for a bounded period
///
/// Created only by a successful borrow transaction; mutated exactly once, by
/// a successful return transaction, which sets `returned_at` and the terminal
/// status. Re-borrowing the same book creates a new Loan with a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Identity, assigned at creation
    pub loan_id: LoanId,
    /// Borrowed book; never reassigned
    pub book_id: BookId,
    /// Borrowing member; never reassigned
    pub member_id: MemberId,
    /// Set at creation, immutable
    pub borrowed_at: DateTime<Utc>,
    /// `borrowed_at + loan_period`, computed once, immutable
    pub due_at: DateTime<Utc>,
    /// None until the loan is closed; set exactly once
    pub returned_at: Option<DateTime<Utc>>,
    /// Current state-machine position
    pub status: LoanStatus,
}

impl Loan {
    /// Create a freshly issued loan
    ///
    /// `due_at` is computed here and never recomputed.
    pub fn issued(
        loan_id: LoanId,
        book_id: BookId,
        member_id: MemberId,
        borrowed_at: DateTime<Utc>,
        loan_period: Duration,
    ) -> Self {
        Loan {
            loan_id,
            book_id,
            member_id,
            borrowed_at,
            due_at: borrowed_at + loan_period,
            returned_at: None,
            status: LoanStatus::InProgress,
        }
    }

    /// Close this loan, classifying it as `Returned` or `Overdue`
    ///
    /// Fails with `InvalidState` if the loan is already terminal, so a second
    /// return attempt fails cleanly instead of silently succeeding.
    pub fn close(&mut self, returned_at: DateTime<Utc>) -> CircResult<LoanStatus> {
        if self.status.is_terminal() {
            return Err(CircError::LoanNotInProgress {
                loan_id: self.loan_id,
                status: self.status,
            });
        }
        let terminal = LoanStatus::classify_return(returned_at, self.due_at);
        self.returned_at = Some(returned_at);
        self.status = terminal;
        Ok(terminal)
    }

    /// Whether this loan is still open
    pub fn is_in_progress(&self) -> bool {
        self.status == LoanStatus::InProgress
    }
}

/// Per-book copy counters
///
/// Invariant at rest: `0 <= copies_available <= copies_total`.
/// Mutated only by the transaction manager: borrow decrements
/// `copies_available`, return increments it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Book identity
    pub book_id: BookId,
    /// Copies the library owns
    pub copies_total: u32,
    /// Copies currently on the shelf
    pub copies_available: u32,
}

impl InventoryRecord {
    /// Create an inventory record with all copies on the shelf
    pub fn fully_stocked(book_id: BookId, copies_total: u32) -> Self {
        InventoryRecord {
            book_id,
            copies_total,
            copies_available: copies_total,
        }
    }

    /// Check the rest-state invariant
    pub fn invariants_hold(&self) -> bool {
        self.copies_available <= self.copies_total
    }
}

/// Per-member active-loan counter
///
/// Invariant at rest: `0 <= active_loans <= quota`. The quota itself lives in
/// [`crate::policy::CirculationPolicy`]; the record only carries the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Member identity
    pub member_id: MemberId,
    /// Loans currently open for this member
    pub active_loans: u32,
}

impl MemberRecord {
    /// Create a member record with no open loans
    pub fn new(member_id: MemberId) -> Self {
        MemberRecord {
            member_id,
            active_loans: 0,
        }
    }
}

/// A loan plus the denormalized display data attached to it
///
/// Returned by successful borrow/return operations as a read-only
/// convenience; the title, author, and member name come from the catalog and
/// member registry and are not part of any invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDetails {
    /// The loan record itself
    pub loan: Loan,
    /// Catalog title of the borrowed book
    pub book_title: String,
    /// Catalog author of the borrowed book
    pub book_author: String,
    /// Display name of the borrowing member
    pub member_name: String,
}
