use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, extractors::AuthUser},
    error::AppError,
    extract::{JsonBody, PathParam},
    response::{ApiResponse, ApiResult},
    state::AppState,
    users::{
        dto::{CreateUserRequest, ResetPasswordRequest, UpdateRoleRequest, UpdateStatusRequest},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/users", get(list_users).post(create_user))
        .route("/auth/users/:id", axum::routing::delete(delete_user))
        .route("/auth/users/:id/role", put(update_role))
        .route("/auth/users/:id/status", put(update_status))
        .route("/auth/users/:id/password", put(reset_password))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult<Vec<PublicUser>> {
    let users = services::list_users(&state, &principal).await?;
    Ok(Json(ApiResponse::ok(
        users.into_iter().map(PublicUser::from).collect(),
    )))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let user = services::create_user(
        &state,
        &principal,
        &payload.username,
        &payload.email,
        &payload.password,
        payload.role,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(user.into(), "User created")),
    ))
}

#[instrument(skip(state))]
pub async fn update_role(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateRoleRequest>,
) -> ApiResult<PublicUser> {
    let user = services::update_role(&state, &principal, id, payload.role).await?;
    Ok(Json(ApiResponse::with_message(user.into(), "Role updated")))
}

#[instrument(skip(state))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateStatusRequest>,
) -> ApiResult<PublicUser> {
    let user = services::set_active(&state, &principal, id, payload.is_active).await?;
    Ok(Json(ApiResponse::with_message(user.into(), "Status updated")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> ApiResult<PublicUser> {
    let user = services::reset_password(&state, &principal, id, &payload.password).await?;
    Ok(Json(ApiResponse::with_message(user.into(), "Password reset")))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<()> {
    services::delete_user(&state, &principal, id).await?;
    Ok(Json(ApiResponse::message("User deleted")))
}
