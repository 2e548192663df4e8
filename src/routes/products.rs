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
    models::ProductEntity,
    services::catalog::{
        self, CreateProductReq, ProductDetails, ProductFilters, ProductListItem, UpdateProductReq,
    },
};

pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_products))
        .routes(utoipa_axum::routes!(get_product));

    let admin = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_product))
        .routes(utoipa_axum::routes!(update_product))
        .routes(utoipa_axum::routes!(delete_product))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authentication,
        ));

    OpenApiRouter::new().nest("/products", public.merge(admin))
}

/// Browse the catalog. Available products are listed first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Products"],
    params(ProductFilters),
    responses(
        (status = 200, description = "List products", body = Paginated<ProductListItem>)
    )
)]
async fn get_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = catalog::find_all(conn, filters).await?;

    Ok(Json(page))
}

/// Fetch a product with its category, comments and rating.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Products"],
    params(
        ("id" = Uuid, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<ProductDetails, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = catalog::find_one(conn, id).await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Get product successfully"),
    })
}

/// Add a product to the catalog (admin).
#[utoipa::path(
    post,
    path = "/",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    request_body = CreateProductReq,
    responses(
        (status = 201, description = "Created product successfully", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Invalid name or price"),
        (status = 404, description = "Category not found")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = catalog::create(conn, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(product),
            message: Some("Created product successfully"),
        },
    ))
}

/// Partially update a product (admin). Existing orders keep their purchase price.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Product ID to update")
    ),
    request_body = UpdateProductReq,
    responses(
        (status = 200, description = "Updated product successfully", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "Product or category not found")
    )
)]
async fn update_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = catalog::update(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Updated product successfully"),
    })
}

/// Soft-delete a product and drop it from every cart (admin).
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Product ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted product successfully", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn delete_product(
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

    let product = catalog::remove(conn, id).await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Deleted product successfully"),
    })
}
