//! HTTP API layer with Axum routes and extractors.
//!
//! This crate provides:
//! - REST routes over the budget query service
//! - The caller identity extractor
//! - Error responses and the server-sent change stream

pub mod error;
pub mod extractors;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use carebudget_core::BudgetQueryService;

/// Application state shared across handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Query and write facade over the ledger store.
    pub service: Arc<BudgetQueryService>,
    /// Idle interval after which the change stream sends a keep-alive.
    pub keep_alive: Duration,
}

impl AppState {
    /// Creates the state with the given keep-alive interval.
    #[must_use]
    pub fn new(service: Arc<BudgetQueryService>, keep_alive: Duration) -> Self {
        Self {
            service,
            keep_alive,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
