//! Centralized error handling for the buffer core
//! Defines the error type, severity levels, and error codes

use crate::constants::errors as codes;
use std::fmt;

/// Severity level of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational message (not really an error)
    Info,
    /// Warning - something might be wrong but operation can continue
    Warning,
    /// Standard error - operation failed but the buffer is untouched
    Error,
    /// Critical error - internal state may be inconsistent
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Errors reported by buffers, transactions and history replay.
///
/// Every failure is reported before anything is applied: a transaction that
/// returns one of these leaves the buffer exactly as it was and fires no
/// edit notifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// A byte range reaches past the end of the buffer
    #[error("range {offset}..{end} is out of bounds (len: {len})")]
    OutOfRange {
        offset: usize,
        end: usize,
        len: usize,
    },

    /// Two operations of the same transaction touch overlapping bytes
    #[error("edits {first:?} and {second:?} overlap")]
    OverlappingEdits {
        first: std::ops::Range<usize>,
        second: std::ops::Range<usize>,
    },

    /// Another transaction currently holds the buffer
    #[error("a transaction is already open on this buffer")]
    TransactionInProgress,

    /// An undo/redo record no longer matches the buffer content
    #[error("history record at {offset} no longer matches the buffer")]
    StaleHistory { offset: usize },
}

impl BufferError {
    /// How serious the error is
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TransactionInProgress => ErrorSeverity::Warning,
            Self::StaleHistory { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Machine-readable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => codes::OUT_OF_RANGE,
            Self::OverlappingEdits { .. } => codes::OVERLAPPING_EDITS,
            Self::TransactionInProgress => codes::TRANSACTION_IN_PROGRESS,
            Self::StaleHistory { .. } => codes::STALE_HISTORY,
        }
    }

    pub(crate) fn out_of_range(offset: usize, remove_len: usize, len: usize) -> Self {
        Self::OutOfRange {
            offset,
            end: offset.saturating_add(remove_len),
            len,
        }
    }
}

/// Result alias for buffer operations
pub type Result<T> = std::result::Result<T, BufferError>;
