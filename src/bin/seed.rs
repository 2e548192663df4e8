//! Seeds an admin, a customer and a small demo catalog. Safe to run repeatedly.

use anyhow::{Context, Result};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use shopfront_api::{
    MIGRATIONS,
    core::{auth::hash_password, bootstrap, config, db},
    models::{CreateCategoryEntity, CreateProductEntity, CreateUserEntity, Role},
    schema::{categories, products, users},
};
use uuid::Uuid;

const CATALOG: &[(&str, &[(&str, i64)])] = &[
    (
        "Eletrônicos",
        &[("Smart TV 50\"", 279_900), ("Soundbar", 89_990), ("Fone Bluetooth", 19_990)],
    ),
    (
        "Cozinha",
        &[("Cafeteira", 24_990), ("Jogo de Panelas", 39_900), ("Chaleira Elétrica", 12_990)],
    ),
    (
        "Iluminação",
        &[("Luminária de Mesa", 8_990), ("Lâmpada LED", 1_990)],
    ),
];

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;
    let password = std::env::var("SEED_PASSWORD").context("SEED_PASSWORD must be set")?;
    let password = hash_password(&password)?;

    db::run_migrations_blocking(MIGRATIONS, config.database.url.expose_secret()).await?;
    let mut conn = AsyncPgConnection::establish(config.database.url.expose_secret())
        .await
        .context("Failed to connect to the database")?;

    let seeded_users = diesel::insert_into(users::table)
        .values(vec![
            CreateUserEntity {
                name: "Administrator".into(),
                email: "admin@shopfront.local".into(),
                password: password.clone(),
                role: Role::Admin,
            },
            CreateUserEntity {
                name: "Default Customer".into(),
                email: "customer@shopfront.local".into(),
                password,
                role: Role::Customer,
            },
        ])
        .on_conflict(users::email)
        .do_nothing()
        .execute(&mut conn)
        .await
        .context("Failed to seed users")?;
    tracing::info!("Seeded {} users", seeded_users);

    let existing: i64 = categories::table
        .count()
        .get_result(&mut conn)
        .await
        .context("Failed to count categories")?;
    if existing > 0 {
        tracing::info!("Catalog already present, skipping");
        return Ok(());
    }

    for (category, items) in CATALOG {
        let category_id: Uuid = diesel::insert_into(categories::table)
            .values(CreateCategoryEntity {
                name: category.to_string(),
            })
            .returning(categories::id)
            .get_result(&mut conn)
            .await
            .with_context(|| format!("Failed to seed category {category}"))?;

        let rows: Vec<CreateProductEntity> = items
            .iter()
            .map(|(name, cents)| CreateProductEntity {
                name: name.to_string(),
                description: None,
                price: Decimal::new(*cents, 2),
                image_url: None,
                available: true,
                category_id,
            })
            .collect();
        diesel::insert_into(products::table)
            .values(rows)
            .execute(&mut conn)
            .await
            .with_context(|| format!("Failed to seed products of {category}"))?;
    }

    let total: i64 = products::table
        .filter(products::deleted_at.is_null())
        .count()
        .get_result(&mut conn)
        .await
        .context("Failed to count products")?;
    tracing::info!("Seeded {} categories and {} products", CATALOG.len(), total);
    Ok(())
}
