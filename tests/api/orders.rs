use diesel_async::AsyncPgConnection;
use shopfront_api::{
    core::app_error::AppError,
    models::{OrderStatus, Role, UserEntity},
    services::{
        cart::{self, CartItemReq},
        checkout::{self, CreateOrderReq},
        dashboard,
        orders::{self, OrderDetails, OrderFilters, UpdateOrderReq},
    },
};

use crate::common::{auth, cents, create_category, create_product, create_user, test_conn, unique};

async fn place_order(conn: &mut AsyncPgConnection, user: &UserEntity, price: i64, quantity: i32) -> OrderDetails {
    let category = create_category(conn).await;
    let product = create_product(conn, category.id, &unique("Lamp"), cents(price), true).await;
    let item = cart::add_item(
        conn,
        user.id,
        CartItemReq {
            product_id: product.id,
            quantity,
        },
    )
    .await
    .unwrap();
    checkout::create_order(
        conn,
        user.id,
        CreateOrderReq {
            cart_product_ids: vec![item.id],
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let owner = create_user(&mut conn, Role::Customer).await;
    let other = create_user(&mut conn, Role::Customer).await;
    let admin = create_user(&mut conn, Role::Admin).await;
    let order = place_order(&mut conn, &owner, 1000, 1).await;

    let hidden = orders::find_one(&mut conn, &auth(&other), order.order.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));

    let as_admin = orders::find_one(&mut conn, &auth(&admin), order.order.id)
        .await
        .unwrap();
    assert_eq!(as_admin.order.user_id, owner.id);

    let mine = orders::find_all(&mut conn, &auth(&owner), OrderFilters::default())
        .await
        .unwrap();
    assert_eq!(mine.meta.total, 1);
    assert_eq!(mine.data[0].items.len(), 1);

    let theirs = orders::find_all(&mut conn, &auth(&other), OrderFilters::default())
        .await
        .unwrap();
    assert_eq!(theirs.meta.total, 0);
}

#[tokio::test]
async fn status_can_be_overwritten_freely_and_filtered() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let owner = create_user(&mut conn, Role::Customer).await;
    let order = place_order(&mut conn, &owner, 1000, 1).await;

    for status in [OrderStatus::Delivered, OrderStatus::Pending, OrderStatus::Shipped] {
        let updated = orders::update_status(&mut conn, order.order.id, UpdateOrderReq { status })
            .await
            .unwrap();
        assert_eq!(updated.order.status, status);
    }

    let shipped = orders::find_all(
        &mut conn,
        &auth(&owner),
        OrderFilters {
            status: Some(OrderStatus::Shipped),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(shipped.meta.total, 1);

    let pending = orders::find_all(
        &mut conn,
        &auth(&owner),
        OrderFilters {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(pending.meta.total, 0);
}

#[tokio::test]
async fn removed_orders_disappear() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let owner = create_user(&mut conn, Role::Customer).await;
    let order = place_order(&mut conn, &owner, 1000, 1).await;

    orders::remove(&mut conn, order.order.id).await.unwrap();

    assert!(matches!(
        orders::find_one(&mut conn, &auth(&owner), order.order.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        orders::remove(&mut conn, order.order.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn cancelled_orders_do_not_count_as_sales() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let owner = create_user(&mut conn, Role::Customer).await;
    let before = dashboard::dashboard_stats(&mut conn).await.unwrap();

    let order = place_order(&mut conn, &owner, 2500, 2).await;
    let placed = dashboard::dashboard_stats(&mut conn).await.unwrap();
    assert_eq!(placed.total_orders, before.total_orders + 1);
    assert_eq!(placed.total_sales, before.total_sales + cents(5000));

    orders::update_status(
        &mut conn,
        order.order.id,
        UpdateOrderReq {
            status: OrderStatus::Cancelled,
        },
    )
    .await
    .unwrap();
    let after = dashboard::dashboard_stats(&mut conn).await.unwrap();

    assert_eq!(after.total_orders, before.total_orders);
    assert_eq!(after.total_sales, before.total_sales);
    assert_eq!(
        after.orders_by_status["CANCELLED"],
        before.orders_by_status["CANCELLED"] + 1
    );
    assert!(after.recent_orders.iter().any(|o| o.id == order.order.id));
}
