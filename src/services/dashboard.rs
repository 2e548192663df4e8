//! Admin sales report. Cancelled and deleted orders never count towards revenue.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    ExpressionMethods, QueryDsl, QueryableByName, Selectable, SelectableHelper,
    dsl::{count_star, sum},
    prelude::Queryable,
    sql_types::{BigInt, Date, Numeric, Text, Timestamptz, Uuid as SqlUuid},
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::app_error::AppError,
    models::OrderStatus,
    schema::orders,
};

const RECENT_ORDERS: i64 = 10;

#[derive(QueryableByName, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales {
    #[diesel(sql_type = Timestamptz)]
    pub month: DateTime<Utc>,
    #[diesel(sql_type = BigInt)]
    pub orders: i64,
    #[diesel(sql_type = Numeric)]
    #[schema(value_type = String)]
    pub revenue: Decimal,
}

#[derive(QueryableByName, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorySales {
    #[diesel(sql_type = Text)]
    pub category: String,
    #[diesel(sql_type = BigInt)]
    pub orders: i64,
    #[diesel(sql_type = BigInt)]
    pub total_quantity: i64,
    #[diesel(sql_type = Numeric)]
    #[schema(value_type = String)]
    pub revenue: Decimal,
}

#[derive(QueryableByName, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    #[diesel(sql_type = Date)]
    pub day: NaiveDate,
    #[diesel(sql_type = BigInt)]
    pub orders: i64,
    #[diesel(sql_type = Numeric)]
    #[schema(value_type = String)]
    pub revenue: Decimal,
}

#[derive(QueryableByName, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    #[diesel(sql_type = SqlUuid)]
    pub product_id: Uuid,
    #[diesel(sql_type = Text)]
    pub product_name: String,
    #[diesel(sql_type = BigInt)]
    pub total_quantity: i64,
    #[diesel(sql_type = Numeric)]
    #[schema(value_type = String)]
    pub total_revenue: Decimal,
}

#[derive(Queryable, Selectable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[schema(value_type = String)]
    pub total_sales: Decimal,
    pub total_orders: i64,
    #[schema(value_type = String)]
    pub average_order_value: Decimal,
    /// Every status appears, with 0 when no order has it
    pub orders_by_status: BTreeMap<String, i64>,
    pub sales_by_month: Vec<MonthlySales>,
    pub sales_by_category: Vec<CategorySales>,
    pub sales_by_day: Vec<DailySales>,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<RecentOrder>,
}

/// Mean order value rounded to cents, 0 when there are no orders.
pub fn average_order_value(total_sales: Decimal, total_orders: i64) -> Decimal {
    if total_orders <= 0 {
        return Decimal::ZERO;
    }
    (total_sales / Decimal::from(total_orders)).round_dp(2)
}

fn status_counts(rows: Vec<(OrderStatus, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = OrderStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for (status, count) in rows {
        counts.insert(status.as_str().to_string(), count);
    }
    counts
}

const SALES_BY_MONTH: &str = r#"
    SELECT date_trunc('month', o.created_at) AS month,
           COUNT(o.id)::BIGINT AS orders,
           COALESCE(SUM(o.total), 0) AS revenue
    FROM orders o
    WHERE o.status <> 'CANCELLED'
      AND o.deleted_at IS NULL
      AND o.created_at >= NOW() - INTERVAL '12 months'
    GROUP BY 1
    ORDER BY 1 ASC
"#;

const SALES_BY_CATEGORY: &str = r#"
    SELECT c.name AS category,
           COUNT(DISTINCT o.id)::BIGINT AS orders,
           COALESCE(SUM(oi.quantity), 0)::BIGINT AS total_quantity,
           COALESCE(SUM(oi.quantity * oi.price), 0) AS revenue
    FROM order_items oi
    JOIN products p ON oi.product_id = p.id
    JOIN categories c ON p.category_id = c.id
    JOIN orders o ON oi.order_id = o.id
    WHERE o.status <> 'CANCELLED'
      AND o.deleted_at IS NULL
    GROUP BY c.id, c.name
    ORDER BY revenue DESC
"#;

const SALES_BY_DAY: &str = r#"
    SELECT (o.created_at AT TIME ZONE 'UTC')::DATE AS day,
           COUNT(o.id)::BIGINT AS orders,
           COALESCE(SUM(o.total), 0) AS revenue
    FROM orders o
    WHERE o.status <> 'CANCELLED'
      AND o.deleted_at IS NULL
      AND o.created_at >= NOW() - INTERVAL '30 days'
    GROUP BY 1
    ORDER BY 1 ASC
"#;

const TOP_PRODUCTS: &str = r#"
    SELECT oi.product_id AS product_id,
           p.name AS product_name,
           COALESCE(SUM(oi.quantity), 0)::BIGINT AS total_quantity,
           COALESCE(SUM(oi.quantity * oi.price), 0) AS total_revenue
    FROM order_items oi
    JOIN products p ON oi.product_id = p.id
    JOIN orders o ON oi.order_id = o.id
    WHERE o.status <> 'CANCELLED'
      AND o.deleted_at IS NULL
    GROUP BY oi.product_id, p.name
    ORDER BY total_quantity DESC, total_revenue DESC
    LIMIT 10
"#;

pub async fn dashboard_stats(conn: &mut AsyncPgConnection) -> Result<DashboardStats, AppError> {
    let (total_sales, total_orders): (Option<Decimal>, i64) = orders::table
        .filter(orders::status.ne(OrderStatus::Cancelled))
        .filter(orders::deleted_at.is_null())
        .select((sum(orders::total), count_star()))
        .get_result(conn)
        .await
        .context("Failed to aggregate orders")?;
    let total_sales = total_sales.unwrap_or(Decimal::ZERO);

    let by_status: Vec<(OrderStatus, i64)> = orders::table
        .filter(orders::deleted_at.is_null())
        .group_by(orders::status)
        .select((orders::status, count_star()))
        .load(conn)
        .await
        .context("Failed to count orders by status")?;

    let sales_by_month = diesel::sql_query(SALES_BY_MONTH)
        .load::<MonthlySales>(conn)
        .await
        .context("Failed to get monthly sales")?;
    let sales_by_category = diesel::sql_query(SALES_BY_CATEGORY)
        .load::<CategorySales>(conn)
        .await
        .context("Failed to get sales by category")?;
    let sales_by_day = diesel::sql_query(SALES_BY_DAY)
        .load::<DailySales>(conn)
        .await
        .context("Failed to get daily sales")?;
    let top_products = diesel::sql_query(TOP_PRODUCTS)
        .load::<TopProduct>(conn)
        .await
        .context("Failed to get top products")?;

    let recent_orders = orders::table
        .filter(orders::deleted_at.is_null())
        .order_by(orders::created_at.desc())
        .limit(RECENT_ORDERS)
        .select(RecentOrder::as_select())
        .load(conn)
        .await
        .context("Failed to get recent orders")?;

    Ok(DashboardStats {
        total_sales,
        total_orders,
        average_order_value: average_order_value(total_sales, total_orders),
        orders_by_status: status_counts(by_status),
        sales_by_month,
        sales_by_category,
        sales_by_day,
        top_products,
        recent_orders,
    })
}
