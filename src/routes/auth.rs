use anyhow::Context;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    services::users::{self, AuthResponse, LoginReq, RegisterReq},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/auth",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(register))
            .routes(utoipa_axum::routes!(login))
            .routes(utoipa_axum::routes!(admin_login)),
    )
}

/// Create a customer account and sign it in.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Auth"],
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Registered successfully", body = StdResponse<AuthResponse, String>),
        (status = 400, description = "Invalid name, email or password"),
        (status = 409, description = "Email already registered")
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let auth = users::register(conn, &state.tokens, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(auth),
            message: Some("Registered successfully"),
        },
    ))
}

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Auth"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<AuthResponse, String>),
        (status = 401, description = "Invalid credentials")
    )
)]
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let auth = users::login(conn, &state.tokens, body).await?;

    Ok(StdResponse {
        data: Some(auth),
        message: Some("Logged in successfully"),
    })
}

/// Login for the back office. Non-admin accounts are refused.
#[utoipa::path(
    post,
    path = "/admin/login",
    tags = ["Auth"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<AuthResponse, String>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is not an admin")
    )
)]
async fn admin_login(
    State(state): State<AppState>,
    Json(body): Json<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let auth = users::admin_login(conn, &state.tokens, body).await?;

    Ok(StdResponse {
        data: Some(auth),
        message: Some("Logged in successfully"),
    })
}
