use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{JsonBody, PathParam, QueryParams},
    response::{ApiResponse, ApiResult},
    slips::{
        dto::{Pagination, ResolveSlipRequest, SlipQuery, SlipView, SubmitSlipRequest},
        repo_types::SlipStats,
        services::{self, UploadItem},
    },
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/slips", get(list_slips))
        .route("/slips/mine", get(list_my_slips))
        .route("/slips/pending", get(list_pending_slips))
        .route("/slips/stats", get(slip_stats))
        .route("/slips/:id", get(get_slip).delete(delete_slip))
        .route("/slips/:id/image", get(get_slip_image))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/slips", post(submit_slip))
        .route("/slips/:id/resolve", put(resolve_slip))
        .route(
            "/slips/upload",
            post(upload_slip).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

#[instrument(skip(state, payload))]
pub async fn submit_slip(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody<SubmitSlipRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SlipView>>), AppError> {
    let slip = services::submit(
        &state,
        &principal,
        &payload.slip_number,
        payload.amount,
        payload.image_ref,
    )
    .await?;
    let view = services::to_view(&state, slip).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(view, "Slip submitted")),
    ))
}

/// POST /slips/upload (multipart)
/// Fields: `slipNumber`, `amount`, `image` (file).
#[instrument(skip(state, mp))]
pub async fn upload_slip(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SlipView>>), AppError> {
    let mut mp = mp?;
    let mut slip_number: Option<String> = None;
    let mut amount: Option<f64> = None;
    let mut upload: Option<UploadItem> = None;

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("slipNumber") => slip_number = Some(field.text().await.map_err(bad_multipart)?),
            Some("amount") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                let parsed = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| AppError::validation("Amount must be a number"))?;
                amount = Some(parsed);
            }
            Some("image") | Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_multipart)?;
                upload = Some(UploadItem { body, content_type });
            }
            _ => {}
        }
    }

    let slip_number = slip_number.ok_or_else(|| AppError::validation("slipNumber is required"))?;
    let amount = amount.ok_or_else(|| AppError::validation("amount is required"))?;
    let upload = upload.ok_or_else(|| AppError::validation("image is required"))?;

    let slip = services::submit_upload(&state, &principal, &slip_number, amount, upload).await?;
    let view = services::to_view(&state, slip).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(view, "Slip uploaded")),
    ))
}

#[instrument(skip(state))]
pub async fn list_slips(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    QueryParams(q): QueryParams<SlipQuery>,
) -> ApiResult<Vec<SlipView>> {
    let slips = services::list_all(&state, &principal, &q.into()).await?;
    Ok(Json(ApiResponse::ok(services::to_views(&state, slips).await?)))
}

#[instrument(skip(state))]
pub async fn list_pending_slips(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    QueryParams(p): QueryParams<Pagination>,
) -> ApiResult<Vec<SlipView>> {
    let slips = services::list_pending(&state, &principal, p.into_filter()).await?;
    Ok(Json(ApiResponse::ok(services::to_views(&state, slips).await?)))
}

#[instrument(skip(state))]
pub async fn list_my_slips(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    QueryParams(p): QueryParams<Pagination>,
) -> ApiResult<Vec<SlipView>> {
    let slips = services::list_own(&state, &principal, p.into_filter()).await?;
    Ok(Json(ApiResponse::ok(services::to_views(&state, slips).await?)))
}

#[instrument(skip(state))]
pub async fn slip_stats(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult<SlipStats> {
    let stats = services::stats(&state, &principal).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

#[instrument(skip(state))]
pub async fn get_slip(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<SlipView> {
    let slip = services::get(&state, &principal, id).await?;
    Ok(Json(ApiResponse::ok(services::to_view(&state, slip).await?)))
}

/// 307 to a short-lived URL of the slip image.
#[instrument(skip(state))]
pub async fn get_slip_image(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Redirect, AppError> {
    let url = services::image_url(&state, &principal, id).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state, payload))]
pub async fn resolve_slip(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<ResolveSlipRequest>,
) -> ApiResult<SlipView> {
    let slip =
        services::resolve(&state, &principal, id, payload.decision, payload.notes).await?;
    let message = format!("Slip {}", slip.status);
    Ok(Json(ApiResponse::with_message(
        services::to_view(&state, slip).await?,
        message,
    )))
}

#[instrument(skip(state))]
pub async fn delete_slip(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<()> {
    services::delete(&state, &principal, id).await?;
    Ok(Json(ApiResponse::message("Slip deleted")))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation(format!("Invalid multipart body: {}", e.body_text()))
}
