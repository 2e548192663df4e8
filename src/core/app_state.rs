use std::sync::Arc;

use crate::core::{aliases::DbPool, auth::TokenService, config::AppConfig};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub tokens: TokenService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: AppConfig) -> Self {
        Self {
            db_pool,
            tokens: TokenService::new(&config.auth),
            config: Arc::new(config),
        }
    }
}
