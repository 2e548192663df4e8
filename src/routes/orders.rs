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
    models::OrderEntity,
    services::{
        checkout::{self, CreateOrderReq},
        dashboard::{self, DashboardStats},
        orders::{self, OrderDetails, OrderFilters, UpdateOrderReq},
    },
};

pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_dashboard_stats))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(update_order))
            .routes(utoipa_axum::routes!(delete_order))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::authentication,
            )),
    )
}

/// List orders. Customers only see their own; admins see all.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(OrderFilters),
    responses(
        (status = 200, description = "List orders", body = Paginated<OrderDetails>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filters): Query<OrderFilters>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = orders::find_all(conn, &user, filters).await?;

    Ok(Json(page))
}

/// Sales report for the back office (admin).
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get dashboard stats successfully", body = StdResponse<DashboardStats, String>),
        (status = 403, description = "Admin only")
    )
)]
async fn get_dashboard_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let stats = dashboard::dashboard_stats(conn).await?;

    Ok(StdResponse {
        data: Some(stats),
        message: Some("Get dashboard stats successfully"),
    })
}

/// Fetch one order with its lines. Another customer's order reads as not found.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderDetails, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::find_one(conn, &user, id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

/// Check out the selected cart items.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Created order successfully", body = StdResponse<OrderDetails, String>),
        (status = 400, description = "Empty selection, unknown cart items or unavailable products"),
        (status = 403, description = "Customers only")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_customer()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = checkout::create_order(conn, user.id, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(order),
            message: Some("Created order successfully"),
        },
    ))
}

/// Overwrite an order's status (admin).
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<OrderDetails, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn update_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::update_status(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Updated order successfully"),
    })
}

/// Soft-delete an order (admin).
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted order successfully", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn delete_order(
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

    let order = orders::remove(conn, id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Deleted order successfully"),
    })
}
