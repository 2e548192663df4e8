use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        middleware,
        pagination::PageQuery,
    },
    services::cart::{
        self, BulkAddResult, CartItemReq, CartItemSummary, CartItemsReq, CartPage,
        UpdateCartItemReq,
    },
};

/// Cart routes. Only customers have a cart.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(get_total_items))
            .routes(utoipa_axum::routes!(clear_cart))
            .routes(utoipa_axum::routes!(add_item))
            .routes(utoipa_axum::routes!(add_items))
            .routes(utoipa_axum::routes!(update_item))
            .routes(utoipa_axum::routes!(remove_item))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::authentication,
            )),
    )
}

/// Paginated cart lines with the live product snapshot and the whole cart's total.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Get cart successfully", body = CartPage),
        (status = 403, description = "Customers only")
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = cart::find_all(conn, user.id, query.pagination()).await?;

    Ok(Json(page))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct TotalItemsRes {
    total_items: i64,
}

/// Sum of quantities across the cart.
#[utoipa::path(
    get,
    path = "/total",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get cart total successfully", body = StdResponse<TotalItemsRes, String>)
    )
)]
async fn get_total_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let total_items = cart::get_total_items(conn, user.id).await?;

    Ok(StdResponse {
        data: Some(TotalItemsRes { total_items }),
        message: Some("Get cart total successfully"),
    })
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ClearCartRes {
    deleted_count: usize,
}

/// Remove every line from the cart.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Cleared cart successfully", body = StdResponse<ClearCartRes, String>)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted_count = cart::clear(conn, user.id).await?;

    Ok(StdResponse {
        data: Some(ClearCartRes { deleted_count }),
        message: Some("Cleared cart successfully"),
    })
}

/// Add a product to the cart, merging with an existing line for the same product.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    request_body = CartItemReq,
    responses(
        (status = 201, description = "Added item successfully", body = StdResponse<CartItemSummary, String>),
        (status = 400, description = "Quantity must be positive"),
        (status = 404, description = "Product not found or unavailable")
    )
)]
async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = cart::add_item(conn, user.id, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(item),
            message: Some("Added item successfully".to_string()),
        },
    ))
}

/// Add several products at once. Nothing is added unless every line is valid.
#[utoipa::path(
    post,
    path = "/items/bulk",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    request_body = CartItemsReq,
    responses(
        (status = 201, description = "Added items successfully", body = StdResponse<BulkAddResult, String>),
        (status = 400, description = "Empty list or non-positive quantity"),
        (status = 404, description = "Product not found or unavailable")
    )
)]
async fn add_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CartItemsReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let result = cart::add_items(conn, user.id, body).await?;
    let message = format!("{} items added successfully", result.count);

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(result),
            message: Some(message),
        },
    ))
}

/// Overwrite the quantity of a cart line.
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Cart item ID to update")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Updated item successfully", body = StdResponse<CartItemSummary, String>),
        (status = 404, description = "Cart item not found")
    )
)]
async fn update_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = cart::update_item(conn, user.id, id, body).await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Updated item successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Cart item ID to remove")
    ),
    responses(
        (status = 200, description = "Removed item successfully", body = StdResponse<CartItemSummary, String>),
        (status = 404, description = "Cart item not found")
    )
)]
async fn remove_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = cart::remove_item(conn, user.id, id).await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Removed item successfully"),
    })
}
