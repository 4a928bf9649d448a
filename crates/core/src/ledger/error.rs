//! Ledger error types.
//!
//! Every failure the ledger write path or the query facade can surface is a
//! variant here. The Refund Matcher and Aggregator are pure readers and never
//! construct these except through `check_refund`.

use carebudget_shared::AppError;
use carebudget_shared::types::{LineId, Money, MoneyError, TransactionId};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Input Errors ==========
    /// Malformed input: blank identity, bad year, empty or invalid lines.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced transaction or purchase line does not resolve.
    #[error("Reference not found: {0}")]
    Reference(String),

    // ========== Refund Errors ==========
    /// The refund would push the purchase line past its original amount.
    #[error(
        "Refund of {requested} against line {line_id} of transaction {transaction_id} exceeds remaining refundable {remaining_refundable}"
    )]
    OverRefund {
        /// Purchase transaction the refund points at.
        transaction_id: TransactionId,
        /// Purchase line the refund points at.
        line_id: LineId,
        /// Total amount requested against the line in this transaction.
        requested: Money,
        /// Amount still refundable on the line before this request.
        remaining_refundable: Money,
    },

    // ========== Concurrency Errors ==========
    /// A concurrent write raced past the serialization point.
    #[error("Concurrent write conflict: {0}")]
    Conflict(String),

    // ========== Storage Errors ==========
    /// Transient storage failure or timeout.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller abandoned the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Reference(_) => "REFERENCE_NOT_FOUND",
            Self::OverRefund { .. } => "OVER_REFUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Reference(_) => 404,
            Self::Conflict(_) => 409,
            Self::OverRefund { .. } => 422,
            Self::Storage(_) | Self::Cancelled => 503,
        }
    }

    /// Returns true if the caller may retry the whole operation once.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Remaining refundable amount carried by an over-refund rejection.
    #[must_use]
    pub const fn remaining_refundable(&self) -> Option<Money> {
        match self {
            Self::OverRefund {
                remaining_refundable,
                ..
            } => Some(*remaining_refundable),
            _ => None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn reference(message: impl Into<String>) -> Self {
        Self::Reference(message.into())
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::Validation(_) => Self::Validation(message),
            LedgerError::Reference(_) => Self::NotFound(message),
            LedgerError::OverRefund { .. } => Self::BusinessRule(message),
            LedgerError::Conflict(_) => Self::Conflict(message),
            LedgerError::Storage(_) | LedgerError::Cancelled => Self::Storage(message),
        }
    }
}
