use anyhow::Context;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    core::{
        app_error::AppError,
        db::Deleted,
        pagination::{Paginated, Pagination},
    },
    models::{CommentAuthor, CommentEntity, CreateCommentEntity},
    schema::{comments, users},
    services::catalog,
};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;
pub const MIN_CONTENT_CHARS: usize = 3;
pub const MAX_CONTENT_CHARS: usize = 500;

#[derive(Serialize, Debug, ToSchema)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: CommentEntity,
    pub user: CommentAuthor,
}

#[derive(Deserialize, Debug, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CommentFilters {
    pub product_id: Uuid,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentReq {
    pub product_id: Uuid,
    /// 1 to 5
    pub rating: i32,
    pub content: Option<String>,
}

fn validate(body: &CreateCommentReq) -> Result<(), AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&body.rating) {
        return Err(AppError::BadRequest(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    if let Some(content) = &body.content {
        let chars = content.chars().count();
        if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&chars) {
            return Err(AppError::BadRequest(format!(
                "Comment must be between {MIN_CONTENT_CHARS} and {MAX_CONTENT_CHARS} characters"
            )));
        }
    }
    Ok(())
}

pub async fn find_all_by_product(
    conn: &mut AsyncPgConnection,
    filters: CommentFilters,
) -> Result<Paginated<CommentWithAuthor>, AppError> {
    let pagination = Pagination::new(filters.page, filters.limit);

    let total: i64 = comments::table
        .filter(comments::product_id.eq(filters.product_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count comments")?;

    let data = comments::table
        .inner_join(users::table)
        .filter(comments::product_id.eq(filters.product_id))
        .order_by((comments::created_at.desc(), comments::id))
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select((CommentEntity::as_select(), CommentAuthor::as_select()))
        .load::<(CommentEntity, CommentAuthor)>(conn)
        .await
        .context("Failed to get comments")?
        .into_iter()
        .map(|(comment, user)| CommentWithAuthor { comment, user })
        .collect();

    Ok(Paginated::new(data, pagination, total))
}

pub async fn create(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    body: CreateCommentReq,
) -> Result<CommentEntity, AppError> {
    validate(&body)?;

    if catalog::find_product(conn, body.product_id, Deleted::Exclude)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Product"));
    }

    let comment = diesel::insert_into(comments::table)
        .values(CreateCommentEntity {
            product_id: body.product_id,
            user_id,
            rating: body.rating,
            content: body.content,
        })
        .returning(CommentEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create comment")?;

    Ok(comment)
}
