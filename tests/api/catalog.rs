use shopfront_api::{
    core::{app_error::AppError, pagination::SortOrder},
    models::Role,
    services::{
        cart::{self, CartItemReq},
        catalog::{self, ProductFilters, ProductSortBy},
        categories::{self, CategoryReq},
        comments::{self, CreateCommentReq},
    },
};
use uuid::Uuid;

use crate::common::{cents, create_category, create_product, create_user, test_conn, unique};

#[tokio::test]
async fn rating_aggregate_is_the_rounded_mean() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Kettle"), cents(4500), true).await;
    let unrated = create_product(&mut conn, category.id, &unique("Toaster"), cents(3000), true).await;

    for rating in [5, 4, 3] {
        let author = create_user(&mut conn, Role::Customer).await;
        comments::create(
            &mut conn,
            author.id,
            CreateCommentReq {
                product_id: product.id,
                rating,
                content: Some("Works as expected".into()),
            },
        )
        .await
        .unwrap();
    }

    let details = catalog::find_one(&mut conn, product.id).await.unwrap();
    assert_eq!(details.rating.average_rating, 4.0);
    assert_eq!(details.rating.total_ratings, 3);
    assert_eq!(details.comments.len(), 3);
    assert_eq!(details.category.map(|c| c.id), Some(category.id));

    let page = catalog::find_all(
        &mut conn,
        ProductFilters {
            category_id: Some(category.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let listed_unrated = page
        .data
        .iter()
        .find(|item| item.product.id == unrated.id)
        .unwrap();
    assert_eq!(listed_unrated.rating.average_rating, 0.0);
    assert_eq!(listed_unrated.rating.total_ratings, 0);
}

#[tokio::test]
async fn search_ignores_case_and_accents() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let token = Uuid::new_v4().simple().to_string();
    let category = create_category(&mut conn).await;
    let product =
        create_product(&mut conn, category.id, &format!("Café Especial {token}"), cents(3500), true).await;

    let page = catalog::find_all(
        &mut conn,
        ProductFilters {
            search: Some(format!("CAFE especial {token}")),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(page.meta.total, 1);
    assert_eq!(page.data[0].product.id, product.id);
}

#[tokio::test]
async fn available_products_come_first() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let category = create_category(&mut conn).await;
    let cheap_unavailable =
        create_product(&mut conn, category.id, &unique("Cheap"), cents(100), false).await;
    let pricey = create_product(&mut conn, category.id, &unique("Pricey"), cents(90000), true).await;
    let mid = create_product(&mut conn, category.id, &unique("Mid"), cents(5000), true).await;

    let page = catalog::find_all(
        &mut conn,
        ProductFilters {
            category_id: Some(category.id),
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let ids: Vec<Uuid> = page.data.iter().map(|item| item.product.id).collect();
    assert_eq!(ids, vec![mid.id, pricey.id, cheap_unavailable.id]);
}

#[tokio::test]
async fn price_range_and_pagination() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let category = create_category(&mut conn).await;
    for price in [500, 1500, 2500, 3500] {
        create_product(&mut conn, category.id, &unique("Item"), cents(price), true).await;
    }

    let page = catalog::find_all(
        &mut conn,
        ProductFilters {
            category_id: Some(category.id),
            min_price: Some(cents(1000)),
            max_price: Some(cents(3500)),
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.total_pages, 2);
    assert_eq!(page.data.len(), 1);
    assert!(!page.meta.has_next_page);
    assert!(page.meta.has_previous_page);
}

#[tokio::test]
async fn removed_products_leave_listings_and_carts() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let customer = create_user(&mut conn, Role::Customer).await;
    let category = create_category(&mut conn).await;
    let product = create_product(&mut conn, category.id, &unique("Lamp"), cents(1000), true).await;
    cart::add_item(
        &mut conn,
        customer.id,
        CartItemReq {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await
    .unwrap();

    catalog::remove(&mut conn, product.id).await.unwrap();

    assert!(matches!(
        catalog::find_one(&mut conn, product.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(cart::get_total_items(&mut conn, customer.id).await.unwrap(), 0);
    assert!(matches!(
        catalog::remove(&mut conn, product.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn comment_validation() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let author = create_user(&mut conn, Role::Customer).await;

    let missing = comments::create(
        &mut conn,
        author.id,
        CreateCommentReq {
            product_id: Uuid::new_v4(),
            rating: 5,
            content: None,
        },
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn category_names_are_unique_and_counts_are_live() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let name = unique("Books");
    let category = categories::create(&mut conn, CategoryReq { name: name.clone() })
        .await
        .unwrap();

    let duplicate = categories::create(&mut conn, CategoryReq { name }).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    create_product(&mut conn, category.id, &unique("Novel"), cents(4000), true).await;
    let removed = create_product(&mut conn, category.id, &unique("Atlas"), cents(9000), true).await;
    catalog::remove(&mut conn, removed.id).await.unwrap();

    let found = categories::find_one(&mut conn, category.id).await.unwrap();
    assert_eq!(found.product_count, 1);

    categories::remove(&mut conn, category.id).await.unwrap();
    assert!(matches!(
        categories::find_one(&mut conn, category.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn out_of_range_page_is_empty() {
    let Some(mut conn) = test_conn().await else {
        return;
    };
    let category = create_category(&mut conn).await;
    create_product(&mut conn, category.id, &unique("Item"), cents(500), true).await;

    let page = catalog::find_all(
        &mut conn,
        ProductFilters {
            category_id: Some(category.id),
            page: Some(i64::MAX),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.meta.total, 1);
    assert!(!page.meta.has_next_page);
}
