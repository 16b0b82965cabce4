use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::slips::repo_types::{Decision, ImageRef, Slip, SlipFilter, SlipStatus};

/// `POST /slips`. The submitter is always the caller; a `createdBy` in the
/// body is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSlipRequest {
    pub slip_number: String,
    pub amount: f64,
    pub image_ref: ImageRef,
}

/// `PUT /slips/:id/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveSlipRequest {
    #[serde(alias = "status")]
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlipQuery {
    pub status: Option<SlipStatus>,
    pub created_by: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl From<SlipQuery> for SlipFilter {
    fn from(q: SlipQuery) -> Self {
        Self {
            status: q.status,
            created_by: q.created_by,
            limit: q.limit.clamp(1, 200),
            offset: q.offset.max(0),
        }
    }
}

impl Pagination {
    pub fn into_filter(self) -> SlipFilter {
        SlipFilter {
            limit: self.limit.clamp(1, 200),
            offset: self.offset.max(0),
            ..SlipFilter::default()
        }
    }
}

/// Display lookup of a referenced user; `None` when the user was deleted.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlipView {
    pub id: Uuid,
    pub slip_number: String,
    pub amount: f64,
    pub image_ref: ImageRef,
    pub status: SlipStatus,
    pub created_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub notes: Option<String>,
    pub creator: Option<UserSummary>,
    pub verifier: Option<UserSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SlipView {
    pub fn new(slip: Slip, creator: Option<UserSummary>, verifier: Option<UserSummary>) -> Self {
        Self {
            image_ref: slip.image_ref(),
            id: slip.id,
            slip_number: slip.slip_number,
            amount: slip.amount,
            status: slip.status,
            created_by: slip.created_by,
            verified_by: slip.verified_by,
            notes: slip.notes,
            creator,
            verifier,
            created_at: slip.created_at,
            updated_at: slip.updated_at,
        }
    }
}
