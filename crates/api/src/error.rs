//! Error responses.
//!
//! Every failure leaves a handler as `{"error": CODE, "message": text}`.
//! Over-refund rejections also carry `remainingRefundable`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use carebudget_core::LedgerError;
use carebudget_shared::AppError;

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Failure raised by the ledger.
    Ledger(LedgerError),
    /// Failure raised at the HTTP edge.
    App(AppError),
}

impl ApiError {
    /// Missing or blank caller identity.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::App(AppError::Unauthorized(message.into()))
    }

    /// Malformed request outside the ledger's own validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::App(AppError::Validation(message.into()))
    }

    /// HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        let code = match self {
            Self::Ledger(err) => err.http_status_code(),
            Self::App(err) => err.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Ledger(err) => {
                if matches!(err, LedgerError::Storage(_)) {
                    error!(error = %err, "ledger storage failure");
                }
                let mut body = json!({
                    "error": err.error_code(),
                    "message": err.to_string(),
                });
                if let Some(remaining) = err.remaining_refundable() {
                    body["remainingRefundable"] = json!(remaining);
                }
                body
            }
            Self::App(err) => {
                if err.is_transient() {
                    warn!(error = %err, "transient request failure");
                }
                json!({
                    "error": err.error_code(),
                    "message": err.to_string(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
