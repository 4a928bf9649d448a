//! Server-sent change stream for one client/year.
//!
//! Emits a `change` event after every committed write to the budget and a
//! keep-alive comment when idle. Closing the connection drops the
//! subscription.

use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::{debug, warn};

use carebudget_core::SubscriptionEvent;
use carebudget_shared::types::ClientId;

use crate::{AppState, error::ApiError, extractors::PathParams};

/// Creates the change stream route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/clients/{client_id}/budgets/{year}/events", get(change_stream))
}

async fn change_stream(
    State(state): State<AppState>,
    PathParams((client_id, year)): PathParams<(String, i32)>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut subscription = state.service.subscribe(&ClientId::new(client_id), year)?;
    let keep_alive = state.keep_alive;
    debug!(key = %subscription.key(), "change stream opened");

    let stream = async_stream::stream! {
        while let Some(item) = subscription.next_event(keep_alive).await {
            match item {
                SubscriptionEvent::Change(change) => {
                    match Event::default().event("change").json_data(&change) {
                        Ok(event) => yield Ok(event),
                        Err(err) => warn!(error = %err, "failed to encode change event"),
                    }
                }
                SubscriptionEvent::KeepAlive => yield Ok(Event::default().comment("keep-alive")),
            }
        }
    };

    Ok(Sse::new(stream))
}
