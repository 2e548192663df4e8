//! Product listing, lookup and admin maintenance, with rating aggregation.

use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use diesel::{
    ExpressionMethods, OptionalExtension, PgTextExpressionMethods, QueryDsl, SelectableHelper,
    pg::Pg,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    core::{
        app_error::AppError,
        db::Deleted,
        pagination::{Paginated, Pagination, SortOrder},
    },
    models::{
        CategoryEntity, CommentAuthor, CommentEntity, CreateProductEntity, ProductEntity,
        UpdateProductEntity,
    },
    schema::{cart_items, categories, comments, products, users},
    services::comments::CommentWithAuthor,
};

diesel::define_sql_function! {
    /// `unaccent` from the Postgres extension of the same name.
    fn unaccent(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Mean and count of a product's comment ratings.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal, 0 when unrated
    pub average_rating: f64,
    pub total_ratings: i64,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[i32]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        let mean = sum as f64 / ratings.len() as f64;
        Self {
            average_rating: (mean * 10.0).round() / 10.0,
            total_ratings: ratings.len() as i64,
        }
    }
}

/// Loads rating aggregates for `product_ids`. Products without comments are absent from the map.
pub async fn rating_summaries(
    conn: &mut AsyncPgConnection,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, RatingSummary>, AppError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, i32)> = comments::table
        .filter(comments::product_id.eq_any(product_ids))
        .select((comments::product_id, comments::rating))
        .load(conn)
        .await
        .context("Failed to get product ratings")?;

    let mut grouped: HashMap<Uuid, Vec<i32>> = HashMap::new();
    for (product_id, rating) in rows {
        grouped.entry(product_id).or_default().push(rating);
    }

    Ok(grouped
        .into_iter()
        .map(|(id, ratings)| (id, RatingSummary::from_ratings(&ratings)))
        .collect())
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ProductSortBy {
    Price,
    Name,
    #[default]
    CreatedAt,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductFilters {
    /// Case- and accent-insensitive substring of the product name
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub available: Option<bool>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ProductFilters {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ProductListItem {
    #[serde(flatten)]
    pub product: ProductEntity,
    pub category: Option<CategoryEntity>,
    #[serde(flatten)]
    pub rating: RatingSummary,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: ProductEntity,
    pub category: Option<CategoryEntity>,
    pub comments: Vec<CommentWithAuthor>,
    #[serde(flatten)]
    pub rating: RatingSummary,
}

/// Escapes `LIKE` wildcards so user input matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered_products(filters: &ProductFilters) -> products::BoxedQuery<'static, Pg> {
    let mut query = products::table
        .filter(products::deleted_at.is_null())
        .into_boxed();

    if let Some(term) = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        query = query.filter(unaccent(products::name).ilike(unaccent(like_pattern(term))));
    }
    if let Some(category_id) = filters.category_id {
        query = query.filter(products::category_id.eq(category_id));
    }
    if let Some(available) = filters.available {
        query = query.filter(products::available.eq(available));
    }
    if let Some(min_price) = filters.min_price {
        query = query.filter(products::price.ge(min_price));
    }
    if let Some(max_price) = filters.max_price {
        query = query.filter(products::price.le(max_price));
    }

    query
}

/// Lists live products: available ones first, then by the requested key.
pub async fn find_all(
    conn: &mut AsyncPgConnection,
    filters: ProductFilters,
) -> Result<Paginated<ProductListItem>, AppError> {
    let pagination = filters.pagination();

    let total: i64 = filtered_products(&filters)
        .count()
        .get_result(conn)
        .await
        .context("Failed to count products")?;

    let mut query = filtered_products(&filters).order_by(products::available.desc());
    let sort_order = filters.sort_order.unwrap_or_default();
    query = match (filters.sort_by.unwrap_or_default(), sort_order) {
        (ProductSortBy::Price, SortOrder::Asc) => query.then_order_by(products::price.asc()),
        (ProductSortBy::Price, SortOrder::Desc) => query.then_order_by(products::price.desc()),
        (ProductSortBy::Name, SortOrder::Asc) => query.then_order_by(products::name.asc()),
        (ProductSortBy::Name, SortOrder::Desc) => query.then_order_by(products::name.desc()),
        (ProductSortBy::CreatedAt, SortOrder::Asc) => {
            query.then_order_by(products::created_at.asc())
        }
        (ProductSortBy::CreatedAt, SortOrder::Desc) => {
            query.then_order_by(products::created_at.desc())
        }
    };

    let page: Vec<ProductEntity> = query
        .then_order_by(products::id)
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select(ProductEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get products")?;

    let product_ids: Vec<Uuid> = page.iter().map(|p| p.id).collect();
    let mut ratings = rating_summaries(conn, &product_ids).await?;
    let category_ids: Vec<Uuid> = page.iter().map(|p| p.category_id).collect();
    let categories = categories_by_id(conn, &category_ids).await?;

    let data = page
        .into_iter()
        .map(|product| ProductListItem {
            category: categories.get(&product.category_id).cloned(),
            rating: ratings.remove(&product.id).unwrap_or_default(),
            product,
        })
        .collect();

    Ok(Paginated::new(data, pagination, total))
}

async fn categories_by_id(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, CategoryEntity>, AppError> {
    let rows: Vec<CategoryEntity> = categories::table
        .filter(categories::id.eq_any(ids))
        .select(CategoryEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get categories")?;
    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

pub async fn find_product(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    deleted: Deleted,
) -> Result<Option<ProductEntity>, AppError> {
    let mut query = products::table.find(id).into_boxed();
    if deleted.excluded() {
        query = query.filter(products::deleted_at.is_null());
    }
    let product = query
        .select(ProductEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get product")?;
    Ok(product)
}

pub async fn find_one(conn: &mut AsyncPgConnection, id: Uuid) -> Result<ProductDetails, AppError> {
    let product = find_product(conn, id, Deleted::Exclude)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let category = categories::table
        .find(product.category_id)
        .select(CategoryEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get product category")?;

    let comments: Vec<CommentWithAuthor> = comments::table
        .inner_join(users::table)
        .filter(comments::product_id.eq(id))
        .order_by(comments::created_at.desc())
        .select((CommentEntity::as_select(), CommentAuthor::as_select()))
        .load::<(CommentEntity, CommentAuthor)>(conn)
        .await
        .context("Failed to get product comments")?
        .into_iter()
        .map(|(comment, user)| CommentWithAuthor { comment, user })
        .collect();

    let ratings: Vec<i32> = comments.iter().map(|c| c.comment.rating).collect();

    Ok(ProductDetails {
        rating: RatingSummary::from_ratings(&ratings),
        product,
        category,
        comments,
    })
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductReq {
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "19.90")]
    pub price: Decimal,
    pub image_url: Option<String>,
    pub available: Option<bool>,
    pub category_id: Uuid,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductReq {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub available: Option<bool>,
    pub category_id: Option<Uuid>,
}

fn validate_product_fields(name: Option<&str>, price: Option<Decimal>) -> Result<(), AppError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Product name must not be empty".into()));
    }
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err(AppError::BadRequest("Price must not be negative".into()));
    }
    Ok(())
}

async fn ensure_category_exists(
    conn: &mut AsyncPgConnection,
    category_id: Uuid,
) -> Result<(), AppError> {
    let count: i64 = categories::table
        .filter(categories::id.eq(category_id))
        .filter(categories::deleted_at.is_null())
        .count()
        .get_result(conn)
        .await
        .context("Failed to check category")?;
    if count == 0 {
        return Err(AppError::not_found("Category"));
    }
    Ok(())
}

pub async fn create(
    conn: &mut AsyncPgConnection,
    body: CreateProductReq,
) -> Result<ProductEntity, AppError> {
    validate_product_fields(Some(&body.name), Some(body.price))?;
    ensure_category_exists(conn, body.category_id).await?;

    let product = diesel::insert_into(products::table)
        .values(CreateProductEntity {
            name: body.name.trim().to_string(),
            description: body.description,
            price: body.price,
            image_url: body.image_url,
            available: body.available.unwrap_or(true),
            category_id: body.category_id,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create product")?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(product)
}

pub async fn update(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    body: UpdateProductReq,
) -> Result<ProductEntity, AppError> {
    validate_product_fields(body.name.as_deref(), body.price)?;
    if let Some(category_id) = body.category_id {
        ensure_category_exists(conn, category_id).await?;
    }

    let product = diesel::update(
        products::table
            .find(id)
            .filter(products::deleted_at.is_null()),
    )
    .set(UpdateProductEntity {
        name: body.name.map(|n| n.trim().to_string()),
        description: body.description,
        price: body.price,
        image_url: body.image_url,
        available: body.available,
        category_id: body.category_id,
        updated_at: Some(Utc::now()),
    })
    .returning(ProductEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to update product")?;

    product.ok_or_else(|| AppError::not_found("Product"))
}

/// Soft-deletes the product and drops it from every cart.
pub async fn remove(conn: &mut AsyncPgConnection, id: Uuid) -> Result<ProductEntity, AppError> {
    let product = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let product: Option<ProductEntity> = diesel::update(
                    products::table
                        .find(id)
                        .filter(products::deleted_at.is_null()),
                )
                .set(products::deleted_at.eq(Some(Utc::now())))
                .returning(ProductEntity::as_returning())
                .get_result(conn)
                .await
                .optional()
                .context("Failed to delete product")?;

                let Some(product) = product else {
                    return Err(AppError::not_found("Product"));
                };

                diesel::delete(cart_items::table.filter(cart_items::product_id.eq(id)))
                    .execute(conn)
                    .await
                    .context("Failed to remove product from carts")?;

                Ok::<ProductEntity, AppError>(product)
            })
        })
        .await?;

    tracing::info!(product_id = %product.id, "Product deleted");
    Ok(product)
}
