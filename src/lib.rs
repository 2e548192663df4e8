pub mod core;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

use crate::core::{app_state::AppState, swagger};

/// Migrations embedded into the binary which helps with streamlining image building process
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Builds the full application router, Swagger UI included.
pub fn app(state: AppState) -> Result<Router> {
    let (router, mut openapi) = routes::routes_with_openapi(&state).split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Shopfront API")
        .version(env!("CARGO_PKG_VERSION"))
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    Ok(router.merge(swagger_ui).with_state(state))
}
