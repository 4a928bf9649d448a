//! Ledger history, purchase, refund and void routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;

use carebudget_core::{LineInput, RefundRef, Transaction};
use carebudget_shared::types::{CategoryId, ClientId, Money, TransactionId};

use crate::{
    AppState,
    error::ApiError,
    extractors::{CallerId, PathParams},
};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/clients/{client_id}/budgets/{year}/transactions",
            get(list_transactions),
        )
        .route(
            "/clients/{client_id}/budgets/{year}/purchases",
            post(record_purchase),
        )
        .route(
            "/clients/{client_id}/budgets/{year}/refunds",
            post(record_refund),
        )
        .route("/transactions/{transaction_id}/void", post(void_transaction))
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for recording a purchase.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    /// Purchase date.
    pub date: NaiveDate,
    /// Line items.
    pub lines: Vec<PurchaseLineRequest>,
}

/// A purchase line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLineRequest {
    /// Category the amount is booked against.
    pub category_id: CategoryId,
    /// Care item slug.
    pub care_item_slug: String,
    /// Optional label.
    #[serde(default)]
    pub label: Option<String>,
    /// Positive amount.
    pub amount: Money,
}

/// Request body for recording a refund.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Refund date.
    pub date: NaiveDate,
    /// Line items, each pointing at a purchase line.
    pub lines: Vec<RefundLineRequest>,
}

/// A refund line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineRequest {
    /// Category the amount is booked against.
    pub category_id: CategoryId,
    /// Care item slug.
    pub care_item_slug: String,
    /// Optional label.
    #[serde(default)]
    pub label: Option<String>,
    /// Positive amount.
    pub amount: Money,
    /// Purchase line the money is returned against.
    pub refund_of: RefundRef,
}

impl From<PurchaseLineRequest> for LineInput {
    fn from(line: PurchaseLineRequest) -> Self {
        Self {
            category_id: line.category_id,
            care_item_slug: line.care_item_slug,
            label: line.label,
            amount: line.amount,
            refund_of: None,
        }
    }
}

impl From<RefundLineRequest> for LineInput {
    fn from(line: RefundLineRequest) -> Self {
        Self {
            category_id: line.category_id,
            care_item_slug: line.care_item_slug,
            label: line.label,
            amount: line.amount,
            refund_of: Some(line.refund_of),
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_transactions(
    State(state): State<AppState>,
    PathParams((client_id, year)): PathParams<(String, i32)>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let transactions = state
        .service
        .transactions(&ClientId::new(client_id), year)
        .await?;
    Ok(Json(transactions))
}

async fn record_purchase(
    State(state): State<AppState>,
    caller: CallerId,
    PathParams((client_id, year)): PathParams<(String, i32)>,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let request = json_body(payload)?;
    let tx = state
        .service
        .record_purchase(
            &ClientId::new(client_id),
            year,
            request.date,
            request.lines.into_iter().map(LineInput::from).collect(),
            caller.user_id(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

async fn record_refund(
    State(state): State<AppState>,
    caller: CallerId,
    PathParams((client_id, year)): PathParams<(String, i32)>,
    payload: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let request = json_body(payload)?;
    let tx = state
        .service
        .record_refund(
            &ClientId::new(client_id),
            year,
            request.date,
            request.lines.into_iter().map(LineInput::from).collect(),
            caller.user_id(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

async fn void_transaction(
    State(state): State<AppState>,
    _caller: CallerId,
    PathParams(transaction_id): PathParams<TransactionId>,
) -> Result<Json<Transaction>, ApiError> {
    let tx = state.service.void_transaction(transaction_id).await?;
    Ok(Json(tx))
}
