use std::sync::OnceLock;

use diesel::SelectableHelper;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use shopfront_api::{
    MIGRATIONS,
    core::{auth::AuthUser, db},
    models::{
        CategoryEntity, CreateCategoryEntity, CreateProductEntity, CreateUserEntity, ProductEntity,
        Role, UserEntity,
    },
    schema::{categories, products, users},
};
use uuid::Uuid;

static MIGRATED: OnceLock<()> = OnceLock::new();

/// Opens a connection wrapped in a test transaction, or `None` when no test database is configured.
pub async fn test_conn() -> Option<AsyncPgConnection> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    MIGRATED.get_or_init(|| {
        db::run_migrations(MIGRATIONS, &url).expect("migrations should apply");
    });

    let mut conn = AsyncPgConnection::establish(&url)
        .await
        .expect("test database should accept connections");
    conn.begin_test_transaction()
        .await
        .expect("test transaction should start");
    Some(conn)
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::new_v4().simple())
}

pub fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

pub async fn create_user(conn: &mut AsyncPgConnection, role: Role) -> UserEntity {
    diesel::insert_into(users::table)
        .values(CreateUserEntity {
            name: "Test User".into(),
            email: format!("{}@test.local", Uuid::new_v4().simple()),
            password: "not-a-real-hash".into(),
            role,
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .expect("user should insert")
}

pub fn auth(user: &UserEntity) -> AuthUser {
    AuthUser {
        id: user.id,
        role: user.role,
    }
}

pub async fn create_category(conn: &mut AsyncPgConnection) -> CategoryEntity {
    diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            name: unique("Category"),
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .expect("category should insert")
}

pub async fn create_product(
    conn: &mut AsyncPgConnection,
    category_id: Uuid,
    name: &str,
    price: Decimal,
    available: bool,
) -> ProductEntity {
    diesel::insert_into(products::table)
        .values(CreateProductEntity {
            name: name.to_string(),
            description: None,
            price,
            image_url: None,
            available,
            category_id,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .expect("product should insert")
}
