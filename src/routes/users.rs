use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        middleware,
        pagination::{PageQuery, Paginated},
    },
    models::UserEntity,
    services::users::{self, UpdateUserReq},
};

pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/users",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_profile))
            .routes(utoipa_axum::routes!(get_users))
            .routes(utoipa_axum::routes!(get_user))
            .routes(utoipa_axum::routes!(update_user))
            .routes(utoipa_axum::routes!(delete_user))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::authentication,
            )),
    )
}

/// The authenticated caller's own account.
#[utoipa::path(
    get,
    path = "/profile",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get profile successfully", body = StdResponse<UserEntity, String>),
        (status = 401, description = "Missing or invalid token")
    )
)]
async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let profile = users::find_one(conn, user.id).await?;

    Ok(StdResponse {
        data: Some(profile),
        message: Some("Get profile successfully"),
    })
}

/// List live users (admin).
#[utoipa::path(
    get,
    path = "/",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "List users", body = Paginated<UserEntity>),
        (status = 403, description = "Admin only")
    )
)]
async fn get_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = users::find_all(conn, query.pagination()).await?;

    Ok(Json(page))
}

/// Fetch a user by id (admin).
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID to fetch")
    ),
    responses(
        (status = 200, description = "Get user successfully", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found")
    )
)]
async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let found = users::find_one(conn, id).await?;

    Ok(StdResponse {
        data: Some(found),
        message: Some("Get user successfully"),
    })
}

/// Partially update a user (admin).
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID to update")
    ),
    request_body = UpdateUserReq,
    responses(
        (status = 200, description = "Updated user successfully", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered")
    )
)]
async fn update_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = users::update(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated user successfully"),
    })
}

/// Soft-delete a user (admin).
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted user successfully", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found")
    )
)]
async fn delete_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted = users::remove(conn, id).await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted user successfully"),
    })
}
