use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shopfront_api::{
    core::{app_error::AppError, pagination::Pagination},
    models::{OrderStatus, Role},
    schema::{orders, products},
    services::{
        cart::{self, CartItemReq},
        catalog::{self, UpdateProductReq},
        checkout::{self, CreateOrderReq},
        orders as order_service,
    },
};
use uuid::Uuid;

use crate::common::{auth, cents, create_category, create_product, create_user, test_conn, unique};

async fn order_count(conn: &mut AsyncPgConnection, user_id: Uuid) -> i64 {
    orders::table
        .filter(orders::user_id.eq(user_id))
        .count()
        .get_result(conn)
        .await
        .unwrap()
}

async fn add(conn: &mut AsyncPgConnection, user_id: Uuid, product_id: Uuid, quantity: i32) -> Uuid {
    cart::add_item(
        conn,
        user_id,
        CartItemReq {
            product_id,
            quantity,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn checkout_freezes_prices_and_empties_the_cart() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Lamp"), cents(1000), true).await;
    let item_id = add(&mut conn, user.id, product.id, 2).await;

    let cart_page = cart::find_all(&mut conn, user.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(cart_page.meta.total_price, cents(2000));

    let order = checkout::create_order(
        &mut conn,
        user.id,
        CreateOrderReq {
            cart_product_ids: vec![item_id],
        },
    )
    .await
    .unwrap();

    assert_eq!(order.order.total, cents(2000));
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].item.price, cents(1000));
    assert_eq!(order.items[0].item.quantity, 2);
    assert_eq!(order.items[0].product.id, product.id);
    assert_eq!(cart::get_total_items(&mut conn, user.id).await.unwrap(), 0);

    // Later price edits leave the order untouched.
    catalog::update(
        &mut conn,
        product.id,
        UpdateProductReq {
            price: Some(cents(9999)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let reloaded = order_service::find_one(&mut conn, &auth(&user), order.order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.order.total, cents(2000));
    assert_eq!(reloaded.items[0].item.price, cents(1000));
}

#[tokio::test]
async fn only_the_selected_items_are_consumed() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let bought = create_product(&mut conn, category.id, &unique("Lamp"), cents(1000), true).await;
    let kept = create_product(&mut conn, category.id, &unique("Mug"), cents(300), true).await;
    let bought_id = add(&mut conn, user.id, bought.id, 1).await;
    add(&mut conn, user.id, kept.id, 2).await;

    let order = checkout::create_order(
        &mut conn,
        user.id,
        CreateOrderReq {
            cart_product_ids: vec![bought_id, bought_id],
        },
    )
    .await
    .unwrap();

    assert_eq!(order.order.total, cents(1000));
    assert_eq!(cart::get_total_items(&mut conn, user.id).await.unwrap(), 2);
}

#[tokio::test]
async fn another_users_cart_item_is_rejected() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let owner = create_user(&mut conn, Role::Customer).await;
    let intruder = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Lamp"), cents(1000), true).await;
    let item_id = add(&mut conn, owner.id, product.id, 2).await;

    let result = checkout::create_order(
        &mut conn,
        intruder.id,
        CreateOrderReq {
            cart_product_ids: vec![item_id],
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(order_count(&mut conn, intruder.id).await, 0);
    assert_eq!(cart::get_total_items(&mut conn, owner.id).await.unwrap(), 2);
}

#[tokio::test]
async fn unavailable_products_block_checkout() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Lamp"), cents(1000), true).await;
    let item_id = add(&mut conn, user.id, product.id, 1).await;

    diesel::update(products::table.find(product.id))
        .set(products::available.eq(false))
        .execute(&mut conn)
        .await
        .unwrap();

    let result = checkout::create_order(
        &mut conn,
        user.id,
        CreateOrderReq {
            cart_product_ids: vec![item_id],
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(order_count(&mut conn, user.id).await, 0);
}

#[tokio::test]
async fn empty_selection_is_rejected() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;

    let result = checkout::create_order(
        &mut conn,
        user.id,
        CreateOrderReq {
            cart_product_ids: vec![],
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn failure_after_order_insert_rolls_everything_back() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Lamp"), cents(1000), true).await;
    let item_id = add(&mut conn, user.id, product.id, 2).await;

    let plan = checkout::prepare_checkout(&mut conn, user.id, &[item_id])
        .await
        .unwrap();

    let result = checkout::place_order(&mut conn, plan, |order| {
        assert_eq!(order.total, cents(2000));
        Err(AppError::BadRequest("interrupted after insert".into()))
    })
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "interrupted after insert"));
    assert_eq!(order_count(&mut conn, user.id).await, 0);
    assert_eq!(cart::get_total_items(&mut conn, user.id).await.unwrap(), 2);
}
