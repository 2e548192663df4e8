use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::core::{
    app_error::AppError,
    app_state::AppState,
    auth::AuthUser,
};

/// Validates the `Authorization: Bearer` header and injects [`AuthUser`] into request extensions.
///
/// Role checks are left to the handlers via `AuthUser::require_*`.
pub async fn authentication(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    let claims = state.tokens.verify(token)?;
    let user = AuthUser::from(&claims);
    tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
