use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, pg::Pg};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    core::{
        app_error::AppError,
        auth::AuthUser,
        db::Deleted,
        pagination::{Paginated, Pagination},
    },
    models::{OrderEntity, OrderItemEntity, OrderStatus, ProductSummary},
    schema::{order_items, orders, products},
};

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: OrderItemEntity,
    pub product: ProductSummary,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderEntity,
    pub items: Vec<OrderLine>,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateOrderReq {
    pub status: OrderStatus,
}

/// Orders visible to `user`: admins see everyone's, customers only their own.
fn visible_orders(user: &AuthUser, deleted: Deleted) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table.into_boxed();
    if deleted.excluded() {
        query = query.filter(orders::deleted_at.is_null());
    }
    if !user.is_admin() {
        query = query.filter(orders::user_id.eq(user.id));
    }
    query
}

/// Attaches lines and product summaries to each order.
///
/// Products are looked up including soft-deleted rows so old orders keep their names.
async fn with_items(
    conn: &mut AsyncPgConnection,
    orders: Vec<OrderEntity>,
) -> Result<Vec<OrderDetails>, AppError> {
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    let rows: Vec<(OrderItemEntity, ProductSummary)> = order_items::table
        .inner_join(products::table)
        .filter(order_items::order_id.eq_any(&order_ids))
        .order_by(order_items::id)
        .select((OrderItemEntity::as_select(), ProductSummary::as_select()))
        .load(conn)
        .await
        .context("Failed to get order items")?;

    let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for (item, product) in rows {
        grouped
            .entry(item.order_id)
            .or_default()
            .push(OrderLine { item, product });
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetails {
            items: grouped.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

/// Builds the response for a freshly written order from the rows already in hand.
pub async fn load_details(
    conn: &mut AsyncPgConnection,
    order: OrderEntity,
    items: Vec<OrderItemEntity>,
) -> Result<OrderDetails, AppError> {
    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let summaries: HashMap<Uuid, ProductSummary> = products::table
        .filter(products::id.eq_any(&product_ids))
        .select(ProductSummary::as_select())
        .load::<ProductSummary>(conn)
        .await
        .context("Failed to get ordered products")?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let items = items
        .into_iter()
        .map(|item| {
            let product = summaries
                .get(&item.product_id)
                .cloned()
                .ok_or_else(|| AppError::not_found("Product"))?;
            Ok(OrderLine { item, product })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(OrderDetails { order, items })
}

pub async fn find_all(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    filters: OrderFilters,
) -> Result<Paginated<OrderDetails>, AppError> {
    let pagination = Pagination::new(filters.page, filters.limit);

    let filtered = || {
        let mut query = visible_orders(user, Deleted::Exclude);
        if let Some(status) = filters.status {
            query = query.filter(orders::status.eq(status));
        }
        query
    };

    let total: i64 = filtered()
        .count()
        .get_result(conn)
        .await
        .context("Failed to count orders")?;

    let page: Vec<OrderEntity> = filtered()
        .order_by((orders::created_at.desc(), orders::id))
        .limit(pagination.limit)
        .offset(pagination.offset())
        .select(OrderEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get orders")?;

    let data = with_items(conn, page).await?;
    Ok(Paginated::new(data, pagination, total))
}

pub async fn find_one(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<OrderDetails, AppError> {
    let order = visible_orders(user, Deleted::Exclude)
        .filter(orders::id.eq(id))
        .select(OrderEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get order")?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let mut details = with_items(conn, vec![order]).await?;
    details.pop().ok_or_else(|| AppError::not_found("Order"))
}

/// Overwrites the status. Any status may follow any other.
pub async fn update_status(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    body: UpdateOrderReq,
) -> Result<OrderDetails, AppError> {
    let order = diesel::update(orders::table.find(id).filter(orders::deleted_at.is_null()))
        .set((
            orders::status.eq(body.status),
            orders::updated_at.eq(Utc::now()),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to update order status")?
        .ok_or_else(|| AppError::not_found("Order"))?;

    tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");

    let mut details = with_items(conn, vec![order]).await?;
    details.pop().ok_or_else(|| AppError::not_found("Order"))
}

pub async fn remove(conn: &mut AsyncPgConnection, id: Uuid) -> Result<OrderEntity, AppError> {
    let order = diesel::update(orders::table.find(id).filter(orders::deleted_at.is_null()))
        .set(orders::deleted_at.eq(Some(Utc::now())))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to delete order")?
        .ok_or_else(|| AppError::not_found("Order"))?;

    tracing::info!(order_id = %order.id, "Order deleted");
    Ok(order)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn details_flatten_order_and_nest_product() {
        let now = Utc::now();
        let order = OrderEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            total: Decimal::new(2000, 2),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let product = ProductSummary {
            id: Uuid::new_v4(),
            name: "Lamp".into(),
            image_url: None,
        };
        let item = OrderItemEntity {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: product.id,
            quantity: 2,
            price: Decimal::new(1000, 2),
        };

        let json = serde_json::to_value(OrderDetails {
            order,
            items: vec![OrderLine { item, product }],
        })
        .unwrap();

        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["total"], "20.00");
        assert!(json.get("deletedAt").is_none());
        assert_eq!(json["items"][0]["price"], "10.00");
        assert_eq!(json["items"][0]["product"]["name"], "Lamp");
    }

    #[test]
    fn status_filter_parses_from_query() {
        let filters: OrderFilters =
            serde_json::from_value(serde_json::json!({ "status": "SHIPPED", "page": 2 })).unwrap();
        assert_eq!(filters.status, Some(OrderStatus::Shipped));
        assert_eq!(filters.page, Some(2));
    }
}
