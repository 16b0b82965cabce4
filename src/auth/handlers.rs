use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, RegisterRequest},
        extractors::{principal_from_headers, AuthUser},
        guard::{require, Capability},
        repo_types::Role,
        services,
    },
    error::AppError,
    extract::JsonBody,
    response::{ApiResponse, ApiResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

/// Public sign-up. Asking for `role: "admin"` needs an admin bearer token;
/// for a plain account the `Authorization` header is not looked at.
#[instrument(skip(state, headers, payload))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AppError> {
    let role = payload.role.unwrap_or_default();
    if role == Role::Admin {
        if !headers.contains_key(AUTHORIZATION) {
            warn!("anonymous admin registration refused");
            return Err(AppError::Forbidden(
                "Only administrators can create admin accounts".into(),
            ));
        }
        let caller = principal_from_headers(&state, &headers).await?;
        require(&caller, Capability::WriteUsers)?;
    }

    let out = services::register(
        &state,
        &payload.username,
        &payload.email,
        &payload.password,
        role,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(out, "User registered successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let out = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(ApiResponse::with_message(out, "Login successful")))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult<MeResponse> {
    require(&principal, Capability::ReadSelf)?;
    let user = services::current_user(&state, &principal).await?;
    Ok(Json(ApiResponse::ok(MeResponse { user: user.into() })))
}
