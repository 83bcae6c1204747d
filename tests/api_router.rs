mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use mango_store_api::routes::create_app;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> anyhow::Result<Router> {
    let state = common::setup_state().await?;
    Ok(create_app(state))
}

async fn send(app: &Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_reports_ok() -> anyhow::Result<()> {
    let app = app().await?;
    let (status, body) = send(&app, get("/health")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Health check");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_bad_ids_are_404() -> anyhow::Result<()> {
    let app = app().await?;

    let (status, body) = send(&app, get("/api/no-such-thing")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not Found" }));

    let (status, body) = send(&app, get("/api/mangoes/not-a-uuid")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> anyhow::Result<()> {
    let app = app().await?;

    let (status, body) = send(&app, get("/api/cart")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "error": "Authentication credentials were not provided." })
    );

    let request = Request::builder()
        .uri("/api/cart")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())?;
    let (status, _) = send(&app, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn register_then_use_token() -> anyhow::Result<()> {
    let app = app().await?;

    let (status, body) = send(
        &app,
        post_json(
            "/api/register",
            json!({ "username": "alice", "password": "pw123", "email": "a@x.com" }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let (status, body) = send(
        &app,
        post_json(
            "/api/register",
            json!({ "username": "alice", "password": "pw123" }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Username already exists." }));

    let request = Request::builder()
        .uri("/api/profile")
        .header(header::AUTHORIZATION, format!("Token {token}"))
        .body(Body::empty())?;
    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    // Customers cannot create catalog entries.
    let request = Request::builder()
        .method("POST")
        .uri("/api/mangoes")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "name": "Fazli", "price": 60, "stock_quantity": 5 }).to_string(),
        ))?;
    let (status, _) = send(&app, request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> anyhow::Result<()> {
    let app = app().await?;
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn catalog_listing_is_public_and_paginated() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    common::create_category(&state, "Himsagar", 900, 10).await?;
    let app = create_app(state);

    let (status, body) = send(&app, get("/api/mangoes?per_page=5")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"], json!({ "page": 1, "per_page": 5, "total": 1 }));
    assert_eq!(body["data"][0]["name"], "Himsagar");
    assert_eq!(body["data"][0]["average_rating"], 0.0);
    Ok(())
}
