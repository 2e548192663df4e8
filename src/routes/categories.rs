use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
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
        pagination::Paginated,
    },
    models::CategoryEntity,
    services::categories::{
        self, CategoryFilters, CategoryOption, CategoryReq, CategoryShowcase, CategoryWithCount,
        ShowcaseFilters,
    },
};

pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_categories))
        .routes(utoipa_axum::routes!(get_simple_categories))
        .routes(utoipa_axum::routes!(get_categories_with_products))
        .routes(utoipa_axum::routes!(get_category));

    let admin = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_category))
        .routes(utoipa_axum::routes!(update_category))
        .routes(utoipa_axum::routes!(delete_category))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authentication,
        ));

    OpenApiRouter::new().nest("/categories", public.merge(admin))
}

/// List categories with their live product counts.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Categories"],
    params(CategoryFilters),
    responses(
        (status = 200, description = "List categories", body = Paginated<CategoryWithCount>)
    )
)]
async fn get_categories(
    State(state): State<AppState>,
    Query(filters): Query<CategoryFilters>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = categories::find_all(conn, filters).await?;

    Ok(Json(page))
}

/// Id and name of every category, for select inputs.
#[utoipa::path(
    get,
    path = "/all",
    tags = ["Categories"],
    responses(
        (status = 200, description = "List category options", body = StdResponse<Vec<CategoryOption>, String>)
    )
)]
async fn get_simple_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let options = categories::find_all_simple(conn).await?;

    Ok(StdResponse {
        data: Some(options),
        message: Some("Get categories successfully"),
    })
}

/// Categories with their ten newest available products.
#[utoipa::path(
    get,
    path = "/with-products",
    tags = ["Categories"],
    params(ShowcaseFilters),
    responses(
        (status = 200, description = "List categories with products", body = Paginated<CategoryShowcase>)
    )
)]
async fn get_categories_with_products(
    State(state): State<AppState>,
    Query(filters): Query<ShowcaseFilters>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = categories::find_all_with_products(conn, filters).await?;

    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Categories"],
    params(
        ("id" = Uuid, Path, description = "Category ID to fetch")
    ),
    responses(
        (status = 200, description = "Get category successfully", body = StdResponse<CategoryWithCount, String>),
        (status = 404, description = "Category not found")
    )
)]
async fn get_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = categories::find_one(conn, id).await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Get category successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    request_body = CategoryReq,
    responses(
        (status = 201, description = "Created category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 409, description = "Category name already taken")
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = categories::create(conn, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(category),
            message: Some("Created category successfully"),
        },
    ))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Category ID to update")
    ),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Updated category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category name already taken")
    )
)]
async fn update_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category = categories::update(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Updated category successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Category ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "Category not found")
    )
)]
async fn delete_category(
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

    let category = categories::remove(conn, id).await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Deleted category successfully"),
    })
}
