//! Turns selected cart lines into an order with frozen prices.

use std::collections::HashSet;

use anyhow::Context;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::app_error::AppError,
    models::{
        CartItemEntity, CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity,
        OrderStatus, ProductEntity,
    },
    schema::{cart_items, order_items, orders, products},
    services::orders::{OrderDetails, load_details},
};

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderReq {
    /// Ids of the caller's cart items to purchase
    pub cart_product_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    pub cart_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Product price at checkout time
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    pub user_id: Uuid,
    pub lines: Vec<PlannedLine>,
    pub total: Decimal,
}

impl CheckoutPlan {
    pub fn cart_item_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.cart_item_id).collect()
    }
}

/// Checks the loaded cart lines against the request and snapshots their prices.
///
/// `loaded` must already be scoped to `user_id`; any requested id missing from it is
/// either absent or owned by someone else, and the whole checkout is refused.
pub fn plan_checkout(
    user_id: Uuid,
    requested: &[Uuid],
    loaded: Vec<(CartItemEntity, ProductEntity)>,
) -> Result<CheckoutPlan, AppError> {
    if requested.is_empty() {
        return Err(AppError::BadRequest(
            "Select at least one cart item".into(),
        ));
    }

    let requested: HashSet<Uuid> = requested.iter().copied().collect();
    let found: HashSet<Uuid> = loaded
        .iter()
        .filter(|(item, _)| item.user_id == user_id)
        .map(|(item, _)| item.id)
        .collect();
    if found != requested {
        return Err(AppError::BadRequest(
            "One or more cart items were not found".into(),
        ));
    }

    if loaded.iter().any(|(_, product)| !product.is_purchasable()) {
        return Err(AppError::BadRequest(
            "One or more products are no longer available".into(),
        ));
    }

    let lines: Vec<PlannedLine> = loaded
        .into_iter()
        .map(|(item, product)| PlannedLine {
            cart_item_id: item.id,
            product_id: product.id,
            quantity: item.quantity,
            price: product.price,
        })
        .collect();
    let total = lines
        .iter()
        .map(|l| l.price * Decimal::from(l.quantity))
        .sum();

    Ok(CheckoutPlan {
        user_id,
        lines,
        total,
    })
}

async fn load_cart_lines(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<(CartItemEntity, ProductEntity)>, AppError> {
    let lines = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::id.eq_any(ids))
        .filter(cart_items::user_id.eq(user_id))
        .select((CartItemEntity::as_select(), ProductEntity::as_select()))
        .load(conn)
        .await
        .context("Failed to get cart items")?;
    Ok(lines)
}

/// Inserts the order header and its lines.
async fn insert_order(
    conn: &mut AsyncPgConnection,
    plan: &CheckoutPlan,
) -> Result<(OrderEntity, Vec<OrderItemEntity>), AppError> {
    let order = diesel::insert_into(orders::table)
        .values(CreateOrderEntity {
            user_id: plan.user_id,
            total: plan.total,
            status: OrderStatus::Pending,
        })
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create order")?;

    let lines: Vec<CreateOrderItemEntity> = plan
        .lines
        .iter()
        .map(|line| CreateOrderItemEntity {
            order_id: order.id,
            product_id: line.product_id,
            quantity: line.quantity,
            price: line.price,
        })
        .collect();

    let items = diesel::insert_into(order_items::table)
        .values(lines)
        .returning(OrderItemEntity::as_returning())
        .get_results(conn)
        .await
        .context("Failed to create order items")?;

    Ok((order, items))
}

/// Deletes exactly the purchased cart lines. Fails if any of them is already gone.
async fn consume_cart_items(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<(), AppError> {
    let deleted = diesel::delete(
        cart_items::table
            .filter(cart_items::id.eq_any(ids))
            .filter(cart_items::user_id.eq(user_id)),
    )
    .execute(conn)
    .await
    .context("Failed to delete purchased cart items")?;

    if deleted != ids.len() {
        return Err(AppError::BadRequest(
            "Cart changed during checkout, please try again".into(),
        ));
    }
    Ok(())
}

/// Loads the caller's selected cart lines and plans the order from them.
pub async fn prepare_checkout(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    cart_item_ids: &[Uuid],
) -> Result<CheckoutPlan, AppError> {
    let requested: Vec<Uuid> = cart_item_ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let loaded = load_cart_lines(conn, user_id, &requested).await?;
    plan_checkout(user_id, cart_item_ids, loaded)
}

/// Writes the order and consumes its cart lines in one transaction.
///
/// `after_insert` runs once the order rows exist and before the cart is touched;
/// an error from it rolls the whole checkout back.
pub async fn place_order<F>(
    conn: &mut AsyncPgConnection,
    plan: CheckoutPlan,
    after_insert: F,
) -> Result<OrderDetails, AppError>
where
    F: FnOnce(&OrderEntity) -> Result<(), AppError> + Send + 'static,
{
    conn.transaction(move |conn| {
        Box::pin(async move {
            let (order, items) = insert_order(conn, &plan).await?;
            after_insert(&order)?;
            consume_cart_items(conn, plan.user_id, &plan.cart_item_ids()).await?;
            load_details(conn, order, items).await
        })
    })
    .await
}

pub async fn create_order(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    body: CreateOrderReq,
) -> Result<OrderDetails, AppError> {
    let plan = prepare_checkout(conn, user_id, &body.cart_product_ids).await?;
    let details = place_order(conn, plan, |_| Ok(())).await?;

    tracing::info!(
        order_id = %details.order.id,
        %user_id,
        total = %details.order.total,
        items = details.items.len(),
        "Order created"
    );
    Ok(details)
}
