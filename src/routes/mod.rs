pub mod auth;
pub mod cart;
pub mod categories;
pub mod comments;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

use utoipa_axum::router::OpenApiRouter;

use crate::core::app_state::AppState;

/// Every HTTP route with its OpenAPI description.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    health::routes_with_openapi()
        .merge(auth::routes_with_openapi())
        .merge(users::routes_with_openapi(state))
        .merge(products::routes_with_openapi(state))
        .merge(categories::routes_with_openapi(state))
        .merge(cart::routes_with_openapi(state))
        .merge(orders::routes_with_openapi(state))
        .merge(comments::routes_with_openapi(state))
}
