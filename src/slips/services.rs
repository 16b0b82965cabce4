use std::collections::HashMap;

use anyhow::Context;
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::guard::{require, Capability, Principal},
    error::AppError,
    slips::{
        dto::{SlipView, UserSummary},
        repo_types::{Decision, ImageRef, NewSlip, Slip, SlipFilter, SlipStats, SlipStatus},
    },
    state::AppState,
    storage::ext_from_mime,
};

const MAX_SLIP_NUMBER_LEN: usize = 100;
const MAX_NOTES_LEN: usize = 1000;
const PRESIGN_TTL_SECS: u64 = 10 * 60;
const UPLOAD_PREFIX: &str = "slips/";

/// An image received through the multipart upload endpoint.
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

fn validate_slip(slip_number: &str, amount: f64) -> Result<String, AppError> {
    let slip_number = slip_number.trim();
    if slip_number.is_empty() {
        return Err(AppError::validation("Slip number is required"));
    }
    if slip_number.chars().count() > MAX_SLIP_NUMBER_LEN {
        return Err(AppError::validation("Slip number is too long"));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::validation("Amount must be a positive number"));
    }
    Ok(slip_number.to_string())
}

fn normalize_notes(notes: Option<String>) -> Result<Option<String>, AppError> {
    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes
        .as_deref()
        .is_some_and(|n| n.chars().count() > MAX_NOTES_LEN)
    {
        return Err(AppError::validation("Notes are too long"));
    }
    Ok(notes)
}

/// Records a slip whose image is already hosted. `created_by` is always the caller.
pub async fn submit(
    state: &AppState,
    principal: &Principal,
    slip_number: &str,
    amount: f64,
    image: ImageRef,
) -> Result<Slip, AppError> {
    require(principal, Capability::SubmitSlips)?;
    let slip_number = validate_slip(slip_number, amount)?;
    if image.url.trim().is_empty() || image.provider_id.trim().is_empty() {
        return Err(AppError::validation("Image url and provider id are required"));
    }
    // Keys under the upload prefix are only ever minted by `submit_upload`.
    if image.provider_id.trim_start().starts_with(UPLOAD_PREFIX) {
        warn!(user_id = %principal.id, provider_id = %image.provider_id, "reserved image key refused");
        return Err(AppError::validation(
            "Image provider id is reserved for uploaded files",
        ));
    }
    record(state, principal, slip_number, amount, image).await
}

async fn record(
    state: &AppState,
    principal: &Principal,
    slip_number: String,
    amount: f64,
    image: ImageRef,
) -> Result<Slip, AppError> {
    let slip = state
        .slips
        .create(NewSlip {
            slip_number,
            amount,
            image,
            created_by: principal.id,
        })
        .await?;

    info!(slip_id = %slip.id, slip_number = %slip.slip_number, user_id = %principal.id, "slip submitted");
    Ok(slip)
}

/// Object key of an image this service stored on behalf of the slip's submitter.
fn owned_object_key(slip: &Slip) -> Option<&str> {
    let prefix = format!("{UPLOAD_PREFIX}{}/", slip.created_by);
    let key = slip.image_provider_id.as_str();
    key.starts_with(&prefix).then_some(key)
}

/// Pushes the image to object storage, then records the slip pointing at it.
pub async fn submit_upload(
    state: &AppState,
    principal: &Principal,
    slip_number: &str,
    amount: f64,
    upload: UploadItem,
) -> Result<Slip, AppError> {
    require(principal, Capability::SubmitSlips)?;
    let slip_number = validate_slip(slip_number, amount)?;
    if upload.body.is_empty() {
        return Err(AppError::validation("Image file is required"));
    }
    let ext = ext_from_mime(&upload.content_type)
        .ok_or_else(|| AppError::validation("Unsupported image type"))?;

    let key = format!("{UPLOAD_PREFIX}{}/{}.{}", principal.id, Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))
        .map_err(AppError::Unavailable)?;

    let image = ImageRef {
        url: state.storage.object_url(&key),
        provider_id: key.clone(),
    };
    match record(state, principal, slip_number, amount, image).await {
        Ok(slip) => Ok(slip),
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_object(&key).await {
                warn!(error = %cleanup, %key, "orphaned slip image left in storage");
            }
            Err(e)
        }
    }
}

pub async fn resolve(
    state: &AppState,
    principal: &Principal,
    slip_id: Uuid,
    decision: Decision,
    notes: Option<String>,
) -> Result<Slip, AppError> {
    require(principal, Capability::ResolveSlips)?;
    let notes = normalize_notes(notes)?;

    let slip = state
        .slips
        .set_resolution(slip_id, principal.id, decision, notes)
        .await
        .map_err(|e| {
            if let crate::store::StoreError::InvalidTransition(current) = &e {
                warn!(%slip_id, %current, "slip already resolved");
            }
            AppError::store("Slip")(e)
        })?;

    info!(%slip_id, status = %slip.status, resolver = %principal.id, "slip resolved");
    Ok(slip)
}

/// Owner or admin. Callers without `admin:slips:read` get `Forbidden` for
/// both foreign and missing ids.
pub async fn get(state: &AppState, principal: &Principal, slip_id: Uuid) -> Result<Slip, AppError> {
    match state.slips.find_by_id(slip_id).await? {
        Some(slip) if slip.created_by == principal.id => {
            require(principal, Capability::ReadOwnSlips)?;
            Ok(slip)
        }
        found => {
            require(principal, Capability::ReadSlips)?;
            found.ok_or(AppError::NotFound("Slip"))
        }
    }
}

pub async fn list_all(
    state: &AppState,
    principal: &Principal,
    filter: &SlipFilter,
) -> Result<Vec<Slip>, AppError> {
    require(principal, Capability::ReadSlips)?;
    Ok(state.slips.list(filter).await?)
}

pub async fn list_pending(
    state: &AppState,
    principal: &Principal,
    mut filter: SlipFilter,
) -> Result<Vec<Slip>, AppError> {
    filter.status = Some(SlipStatus::Pending);
    list_all(state, principal, &filter).await
}

pub async fn list_own(
    state: &AppState,
    principal: &Principal,
    mut filter: SlipFilter,
) -> Result<Vec<Slip>, AppError> {
    require(principal, Capability::ReadOwnSlips)?;
    filter.created_by = Some(principal.id);
    Ok(state.slips.list(&filter).await?)
}

/// Always re-counted from the store.
pub async fn stats(state: &AppState, principal: &Principal) -> Result<SlipStats, AppError> {
    require(principal, Capability::ReadSlips)?;
    Ok(state.slips.stats().await?)
}

/// Administrative removal; also drops the stored image when we uploaded it.
pub async fn delete(state: &AppState, principal: &Principal, slip_id: Uuid) -> Result<Slip, AppError> {
    require(principal, Capability::DeleteSlips)?;
    let slip = state
        .slips
        .delete(slip_id)
        .await
        .map_err(AppError::store("Slip"))?;

    if let Some(key) = owned_object_key(&slip) {
        if let Err(e) = state.storage.delete_object(key).await {
            error!(error = %e, %key, "delete slip image failed");
        }
    }
    info!(%slip_id, admin = %principal.id, "slip deleted");
    Ok(slip)
}

/// Short-lived URL for the slip image.
pub async fn image_url(state: &AppState, principal: &Principal, slip_id: Uuid) -> Result<String, AppError> {
    let slip = get(state, principal, slip_id).await?;
    let Some(key) = owned_object_key(&slip) else {
        return Ok(slip.image_url);
    };
    state
        .storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {}", key))
        .map_err(AppError::Unavailable)
}

/// Attaches creator/verifier summaries. Missing users stay `None`.
pub async fn to_views(state: &AppState, slips: Vec<Slip>) -> Result<Vec<SlipView>, AppError> {
    let mut ids: Vec<Uuid> = slips
        .iter()
        .flat_map(|s| std::iter::once(s.created_by).chain(s.verified_by))
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let users: HashMap<Uuid, UserSummary> = if ids.is_empty() {
        HashMap::new()
    } else {
        state
            .users
            .find_many(&ids)
            .await?
            .iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect()
    };

    Ok(slips
        .into_iter()
        .map(|s| {
            let creator = users.get(&s.created_by).cloned();
            let verifier = s.verified_by.and_then(|id| users.get(&id).cloned());
            SlipView::new(s, creator, verifier)
        })
        .collect())
}

pub async fn to_view(state: &AppState, slip: Slip) -> Result<SlipView, AppError> {
    let mut views = to_views(state, vec![slip]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Unavailable(anyhow::anyhow!("slip view lost")))
}
