//! In-process tests for the user API, driven through `tower::ServiceExt::oneshot`
//! against a router backed by [`MemoryLedger`].

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use loyalty_core::entities::{OrderNumber, OrderStatus};
use loyalty_core::ledger::{Ledger, MemoryLedger};
use rust_decimal::Decimal;
use tower::ServiceExt;

use crate::server::build_router;
use crate::state::AppState;

const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

fn make_router() -> (Router, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    let state = AppState::new(ledger.clone(), KEY);
    (build_router(state), ledger)
}

async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, cookie, body.to_vec())
}

fn json_request(uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn submit_request(number: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/user/orders")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::COOKIE, cookie)
        .body(Body::from(number.to_string()))
        .unwrap()
}

/// Register `login` and return the `name=value` part of the session cookie.
async fn register(router: &Router, login: &str) -> String {
    let req = json_request(
        "/api/user/register",
        serde_json::json!({ "login": login, "password": "secret" }),
        None,
    );
    let (status, cookie, _) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();
    cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_register_login_and_conflicts() {
    let (router, _) = make_router();
    let cookie = register(&router, "alice").await;
    assert!(cookie.starts_with("gophermart="));

    let dup = json_request(
        "/api/user/register",
        serde_json::json!({ "login": "alice", "password": "other" }),
        None,
    );
    assert_eq!(call(&router, dup).await.0, StatusCode::CONFLICT);

    let ok = json_request(
        "/api/user/login",
        serde_json::json!({ "login": "alice", "password": "secret" }),
        None,
    );
    let (status, set_cookie, _) = call(&router, ok).await;
    assert_eq!(status, StatusCode::OK);
    assert!(set_cookie.is_some());

    let wrong = json_request(
        "/api/user/login",
        serde_json::json!({ "login": "alice", "password": "nope" }),
        None,
    );
    assert_eq!(call(&router, wrong).await.0, StatusCode::UNAUTHORIZED);

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/user/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{"))
        .unwrap();
    assert_eq!(call(&router, malformed).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_session_are_rejected() {
    let (router, _) = make_router();
    let req = Request::builder()
        .uri("/api/user/balance")
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&router, req).await.0, StatusCode::UNAUTHORIZED);

    let forged = get_request("/api/user/balance", "gophermart=not-a-session");
    assert_eq!(call(&router, forged).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_submission_statuses() {
    let (router, _) = make_router();
    let alice = register(&router, "alice").await;
    let bob = register(&router, "bob").await;

    let (status, _, _) = call(&router, submit_request("12345678903", &alice)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _, _) = call(&router, submit_request("12345678903", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = call(&router, submit_request("12345678903", &bob)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _, _) = call(&router, submit_request("12345678900", &alice)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let json_body = Request::builder()
        .method("POST")
        .uri("/api/user/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &alice)
        .body(Body::from("\"79927398713\""))
        .unwrap();
    assert_eq!(call(&router, json_body).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_listing() {
    let (router, ledger) = make_router();
    let alice = register(&router, "alice").await;

    let (status, _, body) = call(&router, get_request("/api/user/orders", &alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    call(&router, submit_request("12345678903", &alice)).await;
    call(&router, submit_request("79927398713", &alice)).await;
    ledger
        .apply_order_verdict(
            OrderNumber::parse("12345678903").unwrap(),
            OrderStatus::Processed,
            Some(Decimal::new(72998, 2)),
        )
        .await
        .unwrap();

    let (status, _, body) = call(&router, get_request("/api/user/orders", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);

    let processed = orders.iter().find(|o| o["number"] == "12345678903").unwrap();
    assert_eq!(processed["status"], "PROCESSED");
    assert_eq!(processed["accrual"], 729.98);

    let fresh = orders.iter().find(|o| o["number"] == "79927398713").unwrap();
    assert_eq!(fresh["status"], "NEW");
    assert!(fresh.get("accrual").is_none());
    assert!(fresh["uploaded_at"].is_string());
}

#[tokio::test]
async fn test_balance_and_withdrawals() {
    let (router, ledger) = make_router();
    let alice = register(&router, "alice").await;

    call(&router, submit_request("12345678903", &alice)).await;
    ledger
        .apply_order_verdict(
            OrderNumber::parse("12345678903").unwrap(),
            OrderStatus::Processed,
            Some(Decimal::from(100)),
        )
        .await
        .unwrap();

    let (status, _, _) = call(&router, get_request("/api/user/withdrawals", &alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let withdraw = |order: &str, sum: serde_json::Value| {
        json_request(
            "/api/user/balance/withdraw",
            serde_json::json!({ "order": order, "sum": sum }),
            Some(alice.as_str()),
        )
    };

    let (status, _, _) = call(&router, withdraw("2377225624", serde_json::json!(150))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    let (status, _, _) = call(&router, withdraw("2377225625", serde_json::json!(10))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _, _) = call(&router, withdraw("2377225624", serde_json::json!(-5))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _, _) = call(&router, withdraw("2377225624", serde_json::json!(60))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = call(&router, get_request("/api/user/balance", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "current": 40.0, "withdrawn": 60.0 }));

    let (status, _, body) = call(&router, get_request("/api/user/withdrawals", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json[0]["order"], "2377225624");
    assert_eq!(json[0]["sum"], 60.0);
    assert!(json[0]["processed_at"].is_string());
}

#[tokio::test]
async fn test_health() {
    let (router, _) = make_router();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = call(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}
