use anyhow::Result;
use secrecy::ExposeSecret;
use shopfront_api::{
    MIGRATIONS, app,
    core::{
        app_state::AppState,
        bootstrap::{self, bootstrap},
        config, db,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count =
        db::run_migrations_blocking(MIGRATIONS, config.database.url.expose_secret()).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database).await?;
    let addr = config.server.socket_addr();
    let app = app(AppState::new(db_pool, config))?;

    tracing::info!("Bootstrapping...");
    bootstrap("ShopfrontApi", app, addr).await?;
    Ok(())
}
