use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Review state of a slip. `Verified` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "slip_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlipStatus {
    Pending,
    Verified,
    Rejected,
}

impl Default for SlipStatus {
    fn default() -> Self {
        SlipStatus::Pending
    }
}

impl std::fmt::Display for SlipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SlipStatus::Pending => "pending",
            SlipStatus::Verified => "verified",
            SlipStatus::Rejected => "rejected",
        })
    }
}

/// Outcome an admin can apply to a pending slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Verified,
    Rejected,
}

impl From<Decision> for SlipStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Verified => SlipStatus::Verified,
            Decision::Rejected => SlipStatus::Rejected,
        }
    }
}

/// Where the slip image lives in the external object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    pub provider_id: String,
}

/// Slip record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Slip {
    pub id: Uuid,
    pub slip_number: String,
    pub amount: f64,
    pub image_url: String,
    pub image_provider_id: String,
    pub status: SlipStatus,
    pub created_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Slip {
    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            url: self.image_url.clone(),
            provider_id: self.image_provider_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSlip {
    pub slip_number: String,
    pub amount: f64,
    pub image: ImageRef,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct SlipFilter {
    pub status: Option<SlipStatus>,
    pub created_by: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for SlipFilter {
    fn default() -> Self {
        Self {
            status: None,
            created_by: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Per-status counts taken at call time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlipStats {
    pub total: i64,
    pub pending: i64,
    pub verified: i64,
    pub rejected: i64,
}

impl SlipStats {
    pub fn add(&mut self, status: SlipStatus, count: i64) {
        match status {
            SlipStatus::Pending => self.pending += count,
            SlipStatus::Verified => self.verified += count,
            SlipStatus::Rejected => self.rejected += count,
        }
        self.total += count;
    }
}
