use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use pledge_types::models::Actor;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::policy;

/// Validate the bearer token and attach the caller as an `Actor` extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::MissingToken)?;

    let claims = state.tokens.validate_access_token(bearer.token())?;

    req.extensions_mut().insert(claims.actor());
    Ok(next.run(req).await)
}

/// Layered inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let actor = req
        .extensions()
        .get::<Actor>()
        .copied()
        .ok_or(ApiError::MissingToken)?;

    if !policy::is_admin(&actor) {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}
