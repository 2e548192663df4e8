use anyhow::{Context, Result};
use diesel::{Connection, pg::PgConnection};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, bb8},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};
use secrecy::ExposeSecret;

use crate::core::{aliases::DbPool, config::DatabaseConfig};

/// Whether a read on a soft-deletable table should see rows carrying `deleted_at`.
///
/// Every repository read of users, categories, products and orders takes one of these
/// explicitly; there is no implicit global filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deleted {
    #[default]
    Exclude,
    Include,
}

impl Deleted {
    pub fn excluded(self) -> bool {
        self == Deleted::Exclude
    }
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let manager =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.expose_secret());
    bb8::Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Builds a pool that only connects on first checkout.
pub fn create_lazy_pool(config: &DatabaseConfig) -> DbPool {
    let manager =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.expose_secret());
    bb8::Pool::builder()
        .max_size(config.max_connections)
        .build_unchecked(manager)
}

/// Runs pending migrations on a dedicated blocking thread, returning how many were applied.
pub async fn run_migrations_blocking(
    migrations: EmbeddedMigrations,
    database_url: &str,
) -> Result<usize> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || run_migrations(migrations, &database_url))
        .await
        .context("Migration task panicked")?
}

pub fn run_migrations(migrations: EmbeddedMigrations, database_url: &str) -> Result<usize> {
    let mut conn =
        PgConnection::establish(database_url).context("Failed to connect for migrations")?;
    let applied = conn
        .run_pending_migrations(migrations)
        .map_err(|err| anyhow::anyhow!("Failed to run migrations: {err}"))?;
    Ok(applied.len())
}
