//! Application-wide error type.
//!
//! Crate-specific errors (the ledger's `LedgerError`, database errors) are
//! folded into [`AppError`] at the edges. The HTTP layer reads the status and
//! code from it.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller identity missing from the request.
    #[error("Caller not identified: {0}")]
    Unauthorized(String),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input is well-formed but breaks a ledger rule.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// A concurrent write won the race.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage backend unavailable or timed out.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::BusinessRule(_) => 422,
            Self::Storage(_) => 503,
        }
    }

    /// Machine-readable code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True when repeating the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Unauthorized(String::new()), 401, "UNAUTHORIZED")]
    #[case(AppError::NotFound(String::new()), 404, "NOT_FOUND")]
    #[case(AppError::Validation(String::new()), 400, "VALIDATION_ERROR")]
    #[case(AppError::BusinessRule(String::new()), 422, "BUSINESS_RULE_VIOLATION")]
    #[case(AppError::Conflict(String::new()), 409, "CONFLICT")]
    #[case(AppError::Storage(String::new()), 503, "STORAGE_ERROR")]
    fn test_status_and_code(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_transient_errors() {
        assert!(AppError::Conflict("raced".into()).is_transient());
        assert!(AppError::Storage("timeout".into()).is_transient());
        assert!(!AppError::Validation("bad".into()).is_transient());
    }

    #[test]
    fn test_display_includes_detail() {
        assert_eq!(
            AppError::Unauthorized("x-user-id missing".into()).to_string(),
            "Caller not identified: x-user-id missing"
        );
        assert_eq!(
            AppError::Storage("timeout".into()).to_string(),
            "Storage error: timeout"
        );
    }
}
