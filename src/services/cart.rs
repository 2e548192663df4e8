//! Per-user cart lines. One row per (user, product); repeated adds merge into it.

use std::collections::HashSet;

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, dsl::sum, upsert::excluded,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::{
        app_error::AppError,
        db::Deleted,
        pagination::{Pagination, PaginationMeta},
    },
    models::{CartItemEntity, CartProductSnapshot, CreateCartItemEntity},
    schema::{cart_items, products},
    services::catalog,
};

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemReq {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CartItemsReq {
    pub items: Vec<CartItemReq>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateCartItemReq {
    pub quantity: i32,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemSummary {
    pub id: Uuid,
    pub quantity: i32,
    pub product_id: Uuid,
}

impl From<CartItemEntity> for CartItemSummary {
    fn from(item: CartItemEntity) -> Self {
        Self {
            id: item.id,
            quantity: item.quantity,
            product_id: item.product_id,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddedCartItem {
    #[serde(flatten)]
    pub item: CartItemSummary,
    pub product: CartProductSnapshot,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BulkAddResult {
    pub count: usize,
    pub items: Vec<AddedCartItem>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub product: CartProductSnapshot,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartMeta {
    #[serde(flatten)]
    pub page: PaginationMeta,
    /// Sum over every line in the cart, not only this page
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CartPage {
    pub data: Vec<CartLine>,
    pub meta: CartMeta,
}

fn ensure_positive(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "Quantity must be greater than zero".into(),
        ));
    }
    Ok(())
}

fn unavailable() -> AppError {
    AppError::NotFound("Product not found or unavailable".into())
}

/// `Σ price × quantity`, rounded to cents.
pub fn cart_total<'a>(lines: impl IntoIterator<Item = &'a (i32, Decimal)>) -> Decimal {
    lines
        .into_iter()
        .map(|(quantity, price)| *price * Decimal::from(*quantity))
        .sum::<Decimal>()
        .round_dp(2)
}

/// Quantity a line ends up with after adding `added`, refusing sums that overflow the column.
fn merged_quantity(current: Option<i32>, added: i32) -> Result<i32, AppError> {
    current
        .unwrap_or(0)
        .checked_add(added)
        .ok_or_else(|| AppError::BadRequest("Quantity exceeds the allowed maximum".into()))
}

/// Inserts the line or adds `quantity` to the existing one in a single statement.
async fn merge_item(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartItemEntity, AppError> {
    let current = cart_items::table
        .filter(cart_items::user_id.eq(user_id))
        .filter(cart_items::product_id.eq(product_id))
        .select(cart_items::quantity)
        .first::<i32>(conn)
        .await
        .optional()
        .context("Failed to get cart item")?;
    merged_quantity(current, quantity)?;

    let item = diesel::insert_into(cart_items::table)
        .values(CreateCartItemEntity {
            user_id,
            product_id,
            quantity,
        })
        .on_conflict((cart_items::user_id, cart_items::product_id))
        .do_update()
        .set((
            cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)),
            cart_items::updated_at.eq(Utc::now()),
        ))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to upsert cart item")?;
    Ok(item)
}

pub async fn add_item(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    body: CartItemReq,
) -> Result<CartItemSummary, AppError> {
    ensure_positive(body.quantity)?;

    let product = catalog::find_product(conn, body.product_id, Deleted::Exclude).await?;
    if !product.is_some_and(|p| p.is_purchasable()) {
        return Err(unavailable());
    }

    let item = merge_item(conn, user_id, body.product_id, body.quantity).await?;
    tracing::debug!(%user_id, product_id = %item.product_id, quantity = item.quantity, "Cart item added");
    Ok(item.into())
}

/// Validates every line before touching the cart, then merges them in one transaction.
pub async fn add_items(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    body: CartItemsReq,
) -> Result<BulkAddResult, AppError> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest(
            "At least one item must be provided".into(),
        ));
    }
    for item in &body.items {
        ensure_positive(item.quantity)?;
    }

    let requested: HashSet<Uuid> = body.items.iter().map(|i| i.product_id).collect();
    let requested: Vec<Uuid> = requested.into_iter().collect();
    let purchasable: i64 = products::table
        .filter(products::id.eq_any(&requested))
        .filter(products::available.eq(true))
        .filter(products::deleted_at.is_null())
        .count()
        .get_result(conn)
        .await
        .context("Failed to check products")?;
    if purchasable != requested.len() as i64 {
        return Err(AppError::NotFound(
            "One or more products not found or unavailable".into(),
        ));
    }

    let items = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let mut added = Vec::with_capacity(body.items.len());
                for line in body.items {
                    let item = merge_item(conn, user_id, line.product_id, line.quantity).await?;
                    let product = products::table
                        .find(item.product_id)
                        .select(CartProductSnapshot::as_select())
                        .first(conn)
                        .await
                        .context("Failed to get cart product")?;
                    added.push(AddedCartItem {
                        item: item.into(),
                        product,
                    });
                }
                Ok::<Vec<AddedCartItem>, AppError>(added)
            })
        })
        .await?;

    Ok(BulkAddResult {
        count: items.len(),
        items,
    })
}

pub async fn update_item(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    id: Uuid,
    body: UpdateCartItemReq,
) -> Result<CartItemSummary, AppError> {
    ensure_positive(body.quantity)?;

    let item = diesel::update(
        cart_items::table
            .find(id)
            .filter(cart_items::user_id.eq(user_id)),
    )
    .set((
        cart_items::quantity.eq(body.quantity),
        cart_items::updated_at.eq(Utc::now()),
    ))
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to update cart item")?;

    item.map(CartItemSummary::from)
        .ok_or_else(|| AppError::not_found("Cart item"))
}

pub async fn remove_item(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<CartItemSummary, AppError> {
    let item = diesel::delete(
        cart_items::table
            .find(id)
            .filter(cart_items::user_id.eq(user_id)),
    )
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to delete cart item")?;

    item.map(CartItemSummary::from)
        .ok_or_else(|| AppError::not_found("Cart item"))
}

pub async fn find_all(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    pagination: Pagination,
) -> Result<CartPage, AppError> {
    let total: i64 = cart_items::table
        .filter(cart_items::user_id.eq(user_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count cart items")?;

    let data = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::user_id.eq(user_id))
        .order_by((cart_items::created_at.asc(), cart_items::id))
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select((
            cart_items::id,
            cart_items::quantity,
            cart_items::created_at,
            CartProductSnapshot::as_select(),
        ))
        .load::<(Uuid, i32, DateTime<Utc>, CartProductSnapshot)>(conn)
        .await
        .context("Failed to get cart items")?
        .into_iter()
        .map(|(id, quantity, created_at, product)| CartLine {
            id,
            quantity,
            created_at,
            product,
        })
        .collect();

    let all_lines: Vec<(i32, Decimal)> = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::user_id.eq(user_id))
        .select((cart_items::quantity, products::price))
        .load(conn)
        .await
        .context("Failed to get cart prices")?;

    Ok(CartPage {
        data,
        meta: CartMeta {
            page: pagination.meta(total),
            total_price: cart_total(&all_lines),
        },
    })
}

pub async fn get_total_items(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<i64, AppError> {
    let total: Option<i64> = cart_items::table
        .filter(cart_items::user_id.eq(user_id))
        .select(sum(cart_items::quantity))
        .get_result(conn)
        .await
        .context("Failed to sum cart quantities")?;
    Ok(total.unwrap_or(0))
}

/// Empties the cart, returning how many lines were removed.
pub async fn clear(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<usize, AppError> {
    let deleted = diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
        .execute(conn)
        .await
        .context("Failed to clear cart")?;
    tracing::debug!(%user_id, deleted, "Cart cleared");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_multiplies_price_by_quantity() {
        let lines = [(2, Decimal::new(1000, 2)), (3, Decimal::new(199, 2))];
        assert_eq!(cart_total(&lines), Decimal::new(2597, 2));
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total(&Vec::<(i32, Decimal)>::new()), Decimal::ZERO);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        assert!(matches!(ensure_positive(0), Err(AppError::BadRequest(_))));
        assert!(matches!(ensure_positive(-3), Err(AppError::BadRequest(_))));
        assert!(ensure_positive(1).is_ok());
    }

    #[test]
    fn merged_quantity_refuses_overflow() {
        assert_eq!(merged_quantity(None, 3).unwrap(), 3);
        assert_eq!(merged_quantity(Some(2), 3).unwrap(), 5);
        assert!(matches!(
            merged_quantity(Some(i32::MAX), 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn cart_meta_flattens_pagination() {
        let meta = CartMeta {
            page: Pagination::default().meta(3),
            total_price: Decimal::new(2000, 2),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["hasNextPage"], false);
        assert_eq!(json["totalPrice"], "20.00");
    }
}
