use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{guard::Principal, services::authenticate};
use crate::{error::AppError, state::AppState};

/// Extracts and validates the bearer token, yielding the caller's principal.
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_headers(state, &parts.headers).await?;
        Ok(AuthUser(principal))
    }
}

/// Authenticates the bearer token carried by `headers`.
pub async fn principal_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Principal, AppError> {
    let token = bearer_token(headers)?;
    authenticate(state, token).await
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthenticated("Missing Authorization header"))?;

    // Expect "Bearer <token>"
    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated("Invalid Authorization header"))?;
    Ok(token)
}
