//! Error types for the circulation engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Failure paths are explicit result values at every call site; nothing in
//! the engine signals business state by panicking or by exceptions caught far
//! up the stack. Callers receive a specific variant plus a human-readable
//! message, and can branch on the coarser [`ErrorKind`] classification.

use crate::types::{BookId, LoanId, LoanStatus, MemberId};
use thiserror::Error;

/// Result type alias for circulation operations
pub type CircResult<T> = std::result::Result<T, CircError>;

/// Error types for the circulation engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CircError {
    /// Referenced book does not exist in the catalog
    #[error("book not found: {0}")]
    BookNotFound(BookId),

    /// Referenced member is not registered
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    /// Referenced loan does not exist
    #[error("loan not found: {0}")]
    LoanNotFound(LoanId),

    /// Book has zero available copies at decision time
    #[error("no copies of {book_id} available")]
    Unavailable {
        /// The depleted book
        book_id: BookId,
    },

    /// A wait for availability expired before a copy was freed
    #[error("no copies of {book_id} became available within {waited_ms}ms")]
    WaitTimedOut {
        /// The book waited on
        book_id: BookId,
        /// How long the caller waited, in milliseconds
        waited_ms: u64,
    },

    /// Member already has the maximum number of active loans
    #[error("{member_id} already has {quota} active loans")]
    QuotaExceeded {
        /// The member at cap
        member_id: MemberId,
        /// The per-member cap that was hit
        quota: u32,
    },

    /// Return attempted on a loan that is not in progress
    #[error("{loan_id} is {status}, not in progress")]
    LoanNotInProgress {
        /// The loan in a terminal state
        loan_id: LoanId,
        /// Its current status
        status: LoanStatus,
    },

    /// Underlying transaction/storage error (wraps the lower-level cause)
    #[error("storage error: {0}")]
    Storage(String),

    /// The caller's wait was cancelled before resolution
    #[error("wait cancelled")]
    Cancelled,
}

/// Coarse classification of [`CircError`] variants
///
/// One kind per failure family; callers that only care about the family
/// (retry policy, HTTP mapping downstream) branch on this instead of the
/// full variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced book, member, or loan does not exist
    NotFound,
    /// No copies available (including wait timeout)
    Unavailable,
    /// Member at the active-loan cap
    QuotaExceeded,
    /// Operation illegal for the record's current state
    InvalidState,
    /// Underlying storage failure
    StorageFailure,
    /// Caller's wait was cancelled
    Cancelled,
}

impl CircError {
    /// Classify this error into its [`ErrorKind`]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CircError::BookNotFound(_)
            | CircError::MemberNotFound(_)
            | CircError::LoanNotFound(_) => ErrorKind::NotFound,
            CircError::Unavailable { .. } | CircError::WaitTimedOut { .. } => {
                ErrorKind::Unavailable
            }
            CircError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            CircError::LoanNotInProgress { .. } => ErrorKind::InvalidState,
            CircError::Storage(_) => ErrorKind::StorageFailure,
            CircError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
