//! Router tests over the in-memory ledger store.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use carebudget_api::{AppState, create_router};
use carebudget_core::{BudgetKey, BudgetQueryService, InMemoryLedgerStore, ServiceSettings};

const CLIENT: &str = "client-c";

fn service() -> Arc<BudgetQueryService> {
    Arc::new(BudgetQueryService::new(
        Arc::new(InMemoryLedgerStore::new()),
        ServiceSettings::default(),
    ))
}

fn app(service: &Arc<BudgetQueryService>, keep_alive: Duration) -> Router {
    create_router(AppState::new(Arc::clone(service), keep_alive))
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn write(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", "user-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn purchase(app: &Router, amount: &str) -> Value {
    let response = send(
        app,
        write(
            "POST",
            &format!("/api/v1/clients/{CLIENT}/budgets/2025/purchases"),
            &json!({
                "date": "2025-03-14",
                "lines": [{ "categoryId": "hygiene", "careItemSlug": "Soap", "amount": amount }]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

fn refund_body(purchase: &Value, amount: &str) -> Value {
    json!({
        "date": "2025-04-01",
        "lines": [{
            "categoryId": "hygiene",
            "careItemSlug": "soap",
            "amount": amount,
            "refundOf": {
                "transactionId": purchase["id"],
                "lineId": purchase["lines"][0]["lineId"]
            }
        }]
    })
}

#[tokio::test]
async fn test_health() {
    let app = app(&service(), Duration::from_secs(25));
    let response = send(&app, get("/api/v1/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_empty_budget_reads() {
    let app = app(&service(), Duration::from_secs(25));

    let summary = body_json(send(&app, get("/api/v1/clients/c/budgets/2025/summary")).await).await;
    assert_eq!(
        summary,
        json!({
            "annualAllocated": 0,
            "spent": 0,
            "remaining": 0,
            "surplus": 0,
            "openingCarryover": 0.0
        })
    );

    let rows = body_json(send(&app, get("/api/v1/clients/c/budgets/2025/categories")).await).await;
    assert_eq!(rows, json!([]));

    let response = send(&app, get("/api/v1/clients/c/budgets/2025/allocation")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_allocation_then_overspent_category() {
    let app = app(&service(), Duration::from_secs(25));

    let response = send(
        &app,
        write(
            "PUT",
            &format!("/api/v1/clients/{CLIENT}/budgets/2025/allocation"),
            &json!({
                "annualAllocated": "1000",
                "categories": [
                    { "categoryId": "hygiene", "categoryName": "Hygiene", "allocated": "600" }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    purchase(&app, "636").await;

    let rows = body_json(
        send(&app, get(&format!("/api/v1/clients/{CLIENT}/budgets/2025/categories"))).await,
    )
    .await;
    assert_eq!(
        rows,
        json!([{
            "categoryId": "hygiene",
            "item": "Hygiene",
            "category": "Hygiene",
            "allocated": 600,
            "spent": 636,
            "status": "exceeded"
        }])
    );

    let summary = body_json(
        send(&app, get(&format!("/api/v1/clients/{CLIENT}/budgets/2025/summary"))).await,
    )
    .await;
    assert_eq!(summary["spent"], 636);
    assert_eq!(summary["remaining"], 364);
    assert_eq!(summary["surplus"], 400);
}

#[tokio::test]
async fn test_over_refund_reports_remaining() {
    let app = app(&service(), Duration::from_secs(25));
    let bought = purchase(&app, "200").await;
    let uri = format!("/api/v1/clients/{CLIENT}/budgets/2025/refunds");

    let first = send(&app, write("POST", &uri, &refund_body(&bought, "80"))).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = send(&app, write("POST", &uri, &refund_body(&bought, "150"))).await;
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(second).await;
    assert_eq!(body["error"], "OVER_REFUND");
    assert_eq!(body["remainingRefundable"], "120.00");

    let lines = body_json(
        send(
            &app,
            get(&format!("/api/v1/clients/{CLIENT}/budgets/2025/refundable-lines")),
        )
        .await,
    )
    .await;
    assert_eq!(lines[0]["remainingRefundable"], "120.00");
    assert_eq!(lines[0]["refundedSoFar"], "80.00");
    assert_eq!(lines[0]["purchaseDate"], "2025-03-14");
    assert_eq!(lines[0]["careItemSlug"], "soap");
}

#[tokio::test]
async fn test_writes_require_caller() {
    let app = app(&service(), Duration::from_secs(25));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/clients/c/budgets/2025/purchases")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "date": "2025-03-14",
                "lines": [{ "categoryId": "hygiene", "careItemSlug": "soap", "amount": "1" }]
            })
            .to_string(),
        ))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let app = app(&service(), Duration::from_secs(25));
    let response = send(
        &app,
        write(
            "POST",
            "/api/v1/clients/c/budgets/2025/purchases",
            &json!({ "date": "not-a-date", "lines": [] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_oversized_amount_is_validation_error() {
    let app = app(&service(), Duration::from_secs(25));
    for amount in ["92233720368547758.07", "100000000000.01"] {
        let response = send(
            &app,
            write(
                "POST",
                &format!("/api/v1/clients/{CLIENT}/budgets/2025/purchases"),
                &json!({
                    "date": "2025-03-14",
                    "lines": [{ "categoryId": "hygiene", "careItemSlug": "soap", "amount": amount }]
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{amount}");
        assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
    }

    let response = send(
        &app,
        write(
            "PUT",
            &format!("/api/v1/clients/{CLIENT}/budgets/2025/allocation"),
            &json!({ "annualAllocated": "92233720368547758.07" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    purchase(&app, "100000000000").await;
    let lines = body_json(
        send(
            &app,
            get(&format!("/api/v1/clients/{CLIENT}/budgets/2025/refundable-lines")),
        )
        .await,
    )
    .await;
    assert_eq!(lines[0]["remainingRefundable"], "100000000000.00");
}

#[tokio::test]
async fn test_malformed_path_is_validation_error() {
    let app = app(&service(), Duration::from_secs(25));

    let response = send(&app, get("/api/v1/clients/c/budgets/twenty/summary")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");

    let response = send(&app, write("POST", "/api/v1/transactions/not-a-uuid/void", &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_void_and_years() {
    let app = app(&service(), Duration::from_secs(25));
    let bought = purchase(&app, "10").await;
    let id = bought["id"].as_str().unwrap();

    let void_uri = format!("/api/v1/transactions/{id}/void");
    let voided = send(&app, write("POST", &void_uri, &json!({}))).await;
    assert_eq!(voided.status(), StatusCode::OK);
    let first = body_json(voided).await;
    assert!(first["voidedAt"].is_string());

    let again = body_json(send(&app, write("POST", &void_uri, &json!({}))).await).await;
    assert_eq!(again["voidedAt"], first["voidedAt"]);

    let history = body_json(
        send(&app, get(&format!("/api/v1/clients/{CLIENT}/budgets/2025/transactions"))).await,
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let years = body_json(send(&app, get(&format!("/api/v1/clients/{CLIENT}/years"))).await).await;
    assert_eq!(years, json!([2025]));
}

#[tokio::test]
async fn test_void_unknown_transaction_is_not_found() {
    let app = app(&service(), Duration::from_secs(25));
    let response = send(
        &app,
        write(
            "POST",
            "/api/v1/transactions/0190b7a4-0000-7000-8000-000000000000/void",
            &json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "REFERENCE_NOT_FOUND");
}

#[tokio::test]
async fn test_change_stream_emits_after_write() {
    let service = service();
    let app = app(&service, Duration::from_secs(25));

    let response = send(&app, get(&format!("/api/v1/clients/{CLIENT}/budgets/2025/events"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();
    assert_eq!(service.notifier().subscriber_count(&BudgetKey::new(CLIENT, 2025)), 1);

    purchase(&app, "5").await;

    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: change"), "{text}");
    assert!(text.contains("transaction_recorded"), "{text}");

    drop(body);
    assert_eq!(service.notifier().subscriber_count(&BudgetKey::new(CLIENT, 2025)), 0);
}

#[tokio::test]
async fn test_change_stream_keep_alive() {
    let app = app(&service(), Duration::from_millis(20));
    let response = send(&app, get("/api/v1/clients/c/budgets/2025/events")).await;
    let mut body = response.into_body();

    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("keep-alive"), "{text}");
}
