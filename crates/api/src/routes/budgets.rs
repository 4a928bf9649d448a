//! Budget read routes and the allocation write.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use tracing::debug;

use carebudget_core::{AllocationInput, BudgetSummary, BudgetYear, CategoryRow, RefundableLine};
use carebudget_shared::{AppError, types::ClientId};

use crate::{
    AppState,
    error::ApiError,
    extractors::{CallerId, PathParams},
};

/// Creates the budget routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clients/{client_id}/years", get(list_years))
        .route("/clients/{client_id}/budgets/{year}/summary", get(get_summary))
        .route(
            "/clients/{client_id}/budgets/{year}/categories",
            get(list_categories),
        )
        .route(
            "/clients/{client_id}/budgets/{year}/refundable-lines",
            get(list_refundable_lines),
        )
        .route(
            "/clients/{client_id}/budgets/{year}/allocation",
            get(get_allocation).put(put_allocation),
        )
}

/// Years with ledger activity, newest first.
async fn list_years(
    State(state): State<AppState>,
    PathParams(client_id): PathParams<String>,
) -> Result<Json<Vec<i32>>, ApiError> {
    let years = state
        .service
        .available_years(&ClientId::new(client_id))
        .await?;
    Ok(Json(years))
}

async fn get_summary(
    State(state): State<AppState>,
    PathParams((client_id, year)): PathParams<(String, i32)>,
) -> Result<Json<BudgetSummary>, ApiError> {
    let summary = state
        .service
        .summary(&ClientId::new(client_id), year)
        .await?;
    Ok(Json(summary))
}

async fn list_categories(
    State(state): State<AppState>,
    PathParams((client_id, year)): PathParams<(String, i32)>,
) -> Result<Json<Vec<CategoryRow>>, ApiError> {
    let rows = state
        .service
        .category_rows(&ClientId::new(client_id), year)
        .await?;
    Ok(Json(rows))
}

async fn list_refundable_lines(
    State(state): State<AppState>,
    PathParams((client_id, year)): PathParams<(String, i32)>,
) -> Result<Json<Vec<RefundableLine>>, ApiError> {
    let lines = state
        .service
        .refundable_lines(&ClientId::new(client_id), year)
        .await?;
    Ok(Json(lines))
}

/// The stored allocation, or 404 when the year has no budget.
async fn get_allocation(
    State(state): State<AppState>,
    PathParams((client_id, year)): PathParams<(String, i32)>,
) -> Result<Json<BudgetYear>, ApiError> {
    let client_id = ClientId::new(client_id);
    state
        .service
        .budget_year(&client_id, year)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no budget for {client_id}/{year}")).into())
}

async fn put_allocation(
    State(state): State<AppState>,
    caller: CallerId,
    PathParams((client_id, year)): PathParams<(String, i32)>,
    payload: Result<Json<AllocationInput>, JsonRejection>,
) -> Result<Json<BudgetYear>, ApiError> {
    let Json(allocation) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    debug!(user_id = %caller.user_id(), %client_id, year, "allocation write");

    let budget = state
        .service
        .set_allocation(&ClientId::new(client_id), year, allocation)
        .await?;
    Ok(Json(budget))
}
