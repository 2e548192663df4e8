//! Request-level checks that never reach the database.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use shopfront_api::{
    app,
    core::{app_state::AppState, config, db},
    models::{Role, UserEntity},
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "router-test-secret-0123456789abcdef";

fn state() -> AppState {
    let config = config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost:1/unused".into()),
        "JWT_SECRET" => Some(SECRET.into()),
        _ => None,
    })
    .unwrap();
    AppState::new(db::create_lazy_pool(&config.database), config)
}

fn token(state: &AppState, role: Role) -> String {
    let now = Utc::now();
    state
        .tokens
        .issue(&UserEntity {
            id: Uuid::new_v4(),
            name: "Router Test".into(),
            email: "router@test.local".into(),
            password: String::new(),
            role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .unwrap()
}

async fn send(app: Router, method: &str, uri: &str, bearer: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = if method == "POST" {
        request = request.header(header::CONTENT_TYPE, "application/json");
        Body::from("{}")
    } else {
        Body::empty()
    };

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_is_public() {
    let app = app(state()).unwrap();
    let (status, body) = send(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn cart_requires_a_token() {
    let app = app(state()).unwrap();
    let (status, body) = send(app, "GET", "/cart", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["data"].is_null());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn forged_tokens_are_rejected() {
    let app = app(state()).unwrap();
    let (status, _) = send(app, "GET", "/orders", Some("not.a.jwt")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_have_no_cart() {
    let state = state();
    let admin = token(&state, Role::Admin);
    let app = app(state).unwrap();

    let (status, _) = send(app, "GET", "/cart", Some(&admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customers_cannot_reach_admin_routes() {
    let state = state();
    let customer = token(&state, Role::Customer);
    let app = app(state).unwrap();

    let (stats, _) = send(app.clone(), "GET", "/orders/dashboard/stats", Some(&customer)).await;
    assert_eq!(stats, StatusCode::FORBIDDEN);

    let (users, _) = send(app, "GET", "/users", Some(&customer)).await;
    assert_eq!(users, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let app = app(state()).unwrap();
    let (status, body) = send(app, "GET", "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    assert!(paths.keys().any(|path| path.starts_with("/cart/items")));
    assert!(paths.keys().any(|path| path.starts_with("/orders/dashboard/stats")));
    assert!(paths.contains_key("/categories/all"));
    assert!(body["components"]["securitySchemes"]["bearerAuth"].is_object());
}
