use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        middleware,
        pagination::Paginated,
    },
    models::CommentEntity,
    services::comments::{self, CommentFilters, CommentWithAuthor, CreateCommentReq},
};

pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new().routes(utoipa_axum::routes!(get_comments));

    let authenticated = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_comment))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authentication,
        ));

    OpenApiRouter::new().nest("/comments", public.merge(authenticated))
}

/// Reviews of a product, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Comments"],
    params(CommentFilters),
    responses(
        (status = 200, description = "List comments", body = Paginated<CommentWithAuthor>)
    )
)]
async fn get_comments(
    State(state): State<AppState>,
    Query(filters): Query<CommentFilters>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let page = comments::find_all_by_product(conn, filters).await?;

    Ok(Json(page))
}

/// Rate and review a product.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Comments"],
    security(("bearerAuth" = [])),
    request_body = CreateCommentReq,
    responses(
        (status = 201, description = "Created comment successfully", body = StdResponse<CommentEntity, String>),
        (status = 400, description = "Rating or content out of range"),
        (status = 404, description = "Product not found")
    )
)]
async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateCommentReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let comment = comments::create(conn, user.id, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(comment),
            message: Some("Created comment successfully"),
        },
    ))
}
