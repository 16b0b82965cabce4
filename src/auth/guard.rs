//! Role-based authorization checks.
//!
//! The guard never touches storage: it answers whether an already
//! authenticated [`Principal`] holds a [`Capability`].

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{auth::repo_types::Role, error::AppError};

/// Identity attached to a request after its token has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadSelf,
    SubmitSlips,
    ReadOwnSlips,
    ReadUsers,
    WriteUsers,
    ReadSlips,
    ResolveSlips,
    DeleteSlips,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ReadSelf => "read:self",
            Capability::SubmitSlips => "slips:submit",
            Capability::ReadOwnSlips => "slips:read:own",
            Capability::ReadUsers => "admin:users:read",
            Capability::WriteUsers => "admin:users:write",
            Capability::ReadSlips => "admin:slips:read",
            Capability::ResolveSlips => "admin:slips:resolve",
            Capability::DeleteSlips => "admin:slips:delete",
        }
    }
}

impl Role {
    /// Admins hold every capability; users only the self-service ones.
    pub fn grants(self, capability: Capability) -> bool {
        match self {
            Role::Admin => true,
            Role::User => matches!(
                capability,
                Capability::ReadSelf | Capability::SubmitSlips | Capability::ReadOwnSlips
            ),
        }
    }
}

pub fn require(principal: &Principal, capability: Capability) -> Result<(), AppError> {
    if principal.role.grants(capability) {
        return Ok(());
    }
    warn!(
        user_id = %principal.id,
        role = %principal.role,
        capability = capability.as_str(),
        "capability denied"
    );
    Err(AppError::Forbidden(
        "You do not have permission to perform this action".into(),
    ))
}
