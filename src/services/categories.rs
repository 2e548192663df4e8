use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use diesel::{
    ExpressionMethods, OptionalExtension, PgTextExpressionMethods, QueryDsl, SelectableHelper,
    dsl::count_star, pg::Pg,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    core::{
        app_error::AppError,
        pagination::{Paginated, Pagination, SortOrder},
    },
    models::{CategoryEntity, CreateCategoryEntity, ProductCard},
    schema::{categories, products},
    services::catalog::{RatingSummary, rating_summaries},
};

/// Products shown per category on the storefront showcase.
pub const SHOWCASE_PRODUCTS: i64 = 10;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CategorySortBy {
    Name,
    #[default]
    CreatedAt,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CategoryFilters {
    pub search: Option<String>,
    pub sort_by: Option<CategorySortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ShowcaseFilters {
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: CategoryEntity,
    pub product_count: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ShowcaseProduct {
    #[serde(flatten)]
    pub product: ProductCard,
    #[serde(flatten)]
    pub rating: RatingSummary,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CategoryShowcase {
    pub id: Uuid,
    pub name: String,
    pub products: Vec<ShowcaseProduct>,
}

#[derive(Serialize, Debug, ToSchema, diesel::Queryable)]
pub struct CategoryOption {
    pub id: Uuid,
    pub name: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CategoryReq {
    pub name: String,
}

fn live_categories() -> categories::BoxedQuery<'static, Pg> {
    categories::table
        .filter(categories::deleted_at.is_null())
        .into_boxed()
}

fn clean_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name must not be empty".into()));
    }
    Ok(name.to_string())
}

async fn product_counts(
    conn: &mut AsyncPgConnection,
    category_ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>, AppError> {
    let rows: Vec<(Uuid, i64)> = products::table
        .filter(products::category_id.eq_any(category_ids))
        .filter(products::deleted_at.is_null())
        .group_by(products::category_id)
        .select((products::category_id, count_star()))
        .load(conn)
        .await
        .context("Failed to count category products")?;
    Ok(rows.into_iter().collect())
}

async fn with_counts(
    conn: &mut AsyncPgConnection,
    categories: Vec<CategoryEntity>,
) -> Result<Vec<CategoryWithCount>, AppError> {
    let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
    let counts = product_counts(conn, &ids).await?;
    Ok(categories
        .into_iter()
        .map(|category| CategoryWithCount {
            product_count: counts.get(&category.id).copied().unwrap_or(0),
            category,
        })
        .collect())
}

pub async fn find_all(
    conn: &mut AsyncPgConnection,
    filters: CategoryFilters,
) -> Result<Paginated<CategoryWithCount>, AppError> {
    let pagination = Pagination::new(filters.page, filters.limit);
    let search = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let filtered = || {
        let mut query = live_categories();
        if let Some(pattern) = &search {
            query = query.filter(categories::name.ilike(pattern.clone()));
        }
        query
    };

    let total: i64 = filtered()
        .count()
        .get_result(conn)
        .await
        .context("Failed to count categories")?;

    let query = match (
        filters.sort_by.unwrap_or_default(),
        filters.sort_order.unwrap_or_default(),
    ) {
        (CategorySortBy::Name, SortOrder::Asc) => filtered().order_by(categories::name.asc()),
        (CategorySortBy::Name, SortOrder::Desc) => filtered().order_by(categories::name.desc()),
        (CategorySortBy::CreatedAt, SortOrder::Asc) => {
            filtered().order_by(categories::created_at.asc())
        }
        (CategorySortBy::CreatedAt, SortOrder::Desc) => {
            filtered().order_by(categories::created_at.desc())
        }
    };

    let page: Vec<CategoryEntity> = query
        .then_order_by(categories::id)
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select(CategoryEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get categories")?;

    let data = with_counts(conn, page).await?;
    Ok(Paginated::new(data, pagination, total))
}

pub async fn find_one(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> Result<CategoryWithCount, AppError> {
    let category = live_categories()
        .filter(categories::id.eq(id))
        .select(CategoryEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get category")?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let mut data = with_counts(conn, vec![category]).await?;
    data.pop().ok_or_else(|| AppError::not_found("Category"))
}

/// Categories with their newest available products, for the storefront home page.
pub async fn find_all_with_products(
    conn: &mut AsyncPgConnection,
    filters: ShowcaseFilters,
) -> Result<Paginated<CategoryShowcase>, AppError> {
    let pagination = Pagination::new(filters.page, filters.limit);

    let total: i64 = live_categories()
        .count()
        .get_result(conn)
        .await
        .context("Failed to count categories")?;

    let query = match filters.sort_order.unwrap_or_default() {
        SortOrder::Asc => live_categories().order_by(categories::created_at.asc()),
        SortOrder::Desc => live_categories().order_by(categories::created_at.desc()),
    };
    let page: Vec<(Uuid, String)> = query
        .then_order_by(categories::id)
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select((categories::id, categories::name))
        .load(conn)
        .await
        .context("Failed to get categories")?;

    let mut showcases = Vec::with_capacity(page.len());
    for (id, name) in page {
        let cards: Vec<ProductCard> = products::table
            .filter(products::category_id.eq(id))
            .filter(products::available.eq(true))
            .filter(products::deleted_at.is_null())
            .order_by((products::created_at.desc(), products::id))
            .limit(SHOWCASE_PRODUCTS)
            .select(ProductCard::as_select())
            .load(conn)
            .await
            .context("Failed to get category products")?;

        let ids: Vec<Uuid> = cards.iter().map(|p| p.id).collect();
        let mut ratings = rating_summaries(conn, &ids).await?;
        let products = cards
            .into_iter()
            .map(|product| ShowcaseProduct {
                rating: ratings.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect();

        showcases.push(CategoryShowcase { id, name, products });
    }

    Ok(Paginated::new(showcases, pagination, total))
}

pub async fn find_all_simple(
    conn: &mut AsyncPgConnection,
) -> Result<Vec<CategoryOption>, AppError> {
    let options = live_categories()
        .order_by(categories::name.asc())
        .select((categories::id, categories::name))
        .load::<CategoryOption>(conn)
        .await
        .context("Failed to get categories")?;
    Ok(options)
}

async fn ensure_name_free(
    conn: &mut AsyncPgConnection,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    let mut query = live_categories().filter(categories::name.eq(name.to_string()));
    if let Some(id) = except {
        query = query.filter(categories::id.ne(id));
    }
    let taken: i64 = query
        .count()
        .get_result(conn)
        .await
        .context("Failed to check category name")?;
    if taken > 0 {
        return Err(AppError::Conflict(format!("Category `{name}` already exists")));
    }
    Ok(())
}

pub async fn create(
    conn: &mut AsyncPgConnection,
    body: CategoryReq,
) -> Result<CategoryEntity, AppError> {
    let name = clean_name(&body.name)?;
    ensure_name_free(conn, &name, None).await?;

    let category = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity { name })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(AppError::from)?;

    Ok(category)
}

pub async fn update(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    body: CategoryReq,
) -> Result<CategoryEntity, AppError> {
    let name = clean_name(&body.name)?;
    ensure_name_free(conn, &name, Some(id)).await?;

    let category = diesel::update(
        categories::table
            .find(id)
            .filter(categories::deleted_at.is_null()),
    )
    .set((
        categories::name.eq(name),
        categories::updated_at.eq(Utc::now()),
    ))
    .returning(CategoryEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .map_err(AppError::from)?;

    category.ok_or_else(|| AppError::not_found("Category"))
}

pub async fn remove(conn: &mut AsyncPgConnection, id: Uuid) -> Result<CategoryEntity, AppError> {
    let category = diesel::update(
        categories::table
            .find(id)
            .filter(categories::deleted_at.is_null()),
    )
    .set(categories::deleted_at.eq(Some(Utc::now())))
    .returning(CategoryEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to delete category")?;

    let category = category.ok_or_else(|| AppError::not_found("Category"))?;
    tracing::info!(category_id = %category.id, "Category deleted");
    Ok(category)
}
