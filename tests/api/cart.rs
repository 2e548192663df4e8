use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use shopfront_api::{
    core::{app_error::AppError, pagination::Pagination},
    models::Role,
    schema::cart_items,
    services::cart::{self, CartItemReq, CartItemsReq, UpdateCartItemReq},
};

use crate::common::{cents, create_category, create_product, create_user, test_conn, unique};

async fn cart_rows(conn: &mut diesel_async::AsyncPgConnection, user_id: uuid::Uuid) -> i64 {
    cart_items::table
        .filter(cart_items::user_id.eq(user_id))
        .count()
        .get_result(conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn non_positive_quantity_creates_nothing() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;

    for quantity in [0, -1] {
        let result = cart::add_item(
            &mut conn,
            user.id,
            CartItemReq {
                product_id: product.id,
                quantity,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
    assert_eq!(cart_rows(&mut conn, user.id).await, 0);
}

#[tokio::test]
async fn adding_the_same_product_twice_merges_quantities() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;

    let first = cart::add_item(
        &mut conn,
        user.id,
        CartItemReq {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await
    .unwrap();
    let second = cart::add_item(
        &mut conn,
        user.id,
        CartItemReq {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await
    .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);
    assert_eq!(cart_rows(&mut conn, user.id).await, 1);
    assert_eq!(cart::get_total_items(&mut conn, user.id).await.unwrap(), 5);
}

#[tokio::test]
async fn unavailable_products_cannot_be_added() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Lamp"), cents(500), false).await;

    let result = cart::add_item(
        &mut conn,
        user.id,
        CartItemReq {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn bulk_add_is_all_or_nothing() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let ok = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;
    let gone = create_product(&mut conn, category.id, &unique("Lamp"), cents(500), false).await;

    let result = cart::add_items(
        &mut conn,
        user.id,
        CartItemsReq {
            items: vec![
                CartItemReq {
                    product_id: ok.id,
                    quantity: 1,
                },
                CartItemReq {
                    product_id: gone.id,
                    quantity: 1,
                },
            ],
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(cart_rows(&mut conn, user.id).await, 0);

    let empty = cart::add_items(&mut conn, user.id, CartItemsReq { items: vec![] }).await;
    assert!(matches!(empty, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn bulk_add_merges_repeated_products() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;
    let line = |quantity| CartItemReq {
        product_id: product.id,
        quantity,
    };

    let result = cart::add_items(
        &mut conn,
        user.id,
        CartItemsReq {
            items: vec![line(1), line(4)],
        },
    )
    .await
    .unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(result.items[1].item.quantity, 5);
    assert_eq!(result.items[1].product.price, cents(1000));
    assert_eq!(cart_rows(&mut conn, user.id).await, 1);
}

#[tokio::test]
async fn total_price_covers_every_page() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    for (price, quantity) in [(1000, 2), (250, 1), (199, 3)] {
        let product = create_product(&mut conn, category.id, &unique("Item"), cents(price), true).await;
        cart::add_item(
            &mut conn,
            user.id,
            CartItemReq {
                product_id: product.id,
                quantity,
            },
        )
        .await
        .unwrap();
    }

    let page = cart::find_all(&mut conn, user.id, Pagination::new(Some(2), Some(1)))
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.meta.page.total, 3);
    assert_eq!(page.meta.page.total_pages, 3);
    assert!(page.meta.page.has_next_page);
    assert_eq!(page.meta.total_price, cents(2847));
}

#[tokio::test]
async fn other_users_items_read_as_not_found() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let owner = create_user(&mut conn, Role::Customer).await;
    let intruder = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;
    let item = cart::add_item(
        &mut conn,
        owner.id,
        CartItemReq {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await
    .unwrap();

    let update = cart::update_item(
        &mut conn,
        intruder.id,
        item.id,
        UpdateCartItemReq { quantity: 9 },
    )
    .await;
    assert!(matches!(update, Err(AppError::NotFound(_))));

    let remove = cart::remove_item(&mut conn, intruder.id, item.id).await;
    assert!(matches!(remove, Err(AppError::NotFound(_))));

    assert_eq!(cart::get_total_items(&mut conn, owner.id).await.unwrap(), 1);
}

#[tokio::test]
async fn update_overwrites_and_clear_empties() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;
    let item = cart::add_item(
        &mut conn,
        user.id,
        CartItemReq {
            product_id: product.id,
            quantity: 4,
        },
    )
    .await
    .unwrap();

    let updated = cart::update_item(&mut conn, user.id, item.id, UpdateCartItemReq { quantity: 1 })
        .await
        .unwrap();
    assert_eq!(updated.quantity, 1);

    assert_eq!(cart::clear(&mut conn, user.id).await.unwrap(), 1);
    assert_eq!(cart::get_total_items(&mut conn, user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn merged_quantity_cannot_overflow() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let user = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Mug"), cents(1000), true).await;
    let line = |quantity| CartItemReq {
        product_id: product.id,
        quantity,
    };

    cart::add_item(&mut conn, user.id, line(i32::MAX)).await.unwrap();
    let result = cart::add_item(&mut conn, user.id, line(1)).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(
        cart::get_total_items(&mut conn, user.id).await.unwrap(),
        i64::from(i32::MAX)
    );
}
