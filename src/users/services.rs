use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        guard::{require, Capability, Principal},
        repo_types::{Role, User, UserPatch},
        services::{create_account, validate_password},
    },
    error::AppError,
    state::AppState,
};

pub async fn list_users(state: &AppState, principal: &Principal) -> Result<Vec<User>, AppError> {
    require(principal, Capability::ReadUsers)?;
    Ok(state.users.list().await?)
}

pub async fn create_user(
    state: &AppState,
    principal: &Principal,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    require(principal, Capability::WriteUsers)?;
    let user = create_account(state, username, email, password, role).await?;
    info!(user_id = %user.id, role = %user.role, admin = %principal.id, "user created by admin");
    Ok(user)
}

/// Admins may not change their own role, whatever the requested value.
pub async fn update_role(
    state: &AppState,
    principal: &Principal,
    target: Uuid,
    role: Role,
) -> Result<User, AppError> {
    require(principal, Capability::WriteUsers)?;
    if target == principal.id {
        warn!(admin = %principal.id, "self role change refused");
        return Err(AppError::SelfDemotionForbidden);
    }
    let user = state
        .users
        .update(target, UserPatch { role: Some(role), ..Default::default() })
        .await
        .map_err(AppError::store("User"))?;
    info!(user_id = %target, %role, admin = %principal.id, "user role updated");
    Ok(user)
}

pub async fn set_active(
    state: &AppState,
    principal: &Principal,
    target: Uuid,
    is_active: bool,
) -> Result<User, AppError> {
    require(principal, Capability::WriteUsers)?;
    if target == principal.id {
        warn!(admin = %principal.id, "self status change refused");
        return Err(AppError::SelfDeactivationForbidden);
    }
    let user = state
        .users
        .update(target, UserPatch { is_active: Some(is_active), ..Default::default() })
        .await
        .map_err(AppError::store("User"))?;
    info!(user_id = %target, is_active, admin = %principal.id, "user status updated");
    Ok(user)
}

pub async fn reset_password(
    state: &AppState,
    principal: &Principal,
    target: Uuid,
    password: &str,
) -> Result<User, AppError> {
    require(principal, Capability::WriteUsers)?;
    validate_password(password)?;
    let user = state
        .users
        .update(target, UserPatch { password: Some(password.to_string()), ..Default::default() })
        .await
        .map_err(AppError::store("User"))?;
    info!(user_id = %target, admin = %principal.id, "user password reset");
    Ok(user)
}

pub async fn delete_user(state: &AppState, principal: &Principal, target: Uuid) -> Result<(), AppError> {
    require(principal, Capability::WriteUsers)?;
    if target == principal.id {
        warn!(admin = %principal.id, "self deletion refused");
        return Err(AppError::SelfDeletionForbidden);
    }
    state
        .users
        .delete(target)
        .await
        .map_err(AppError::store("User"))?;
    info!(user_id = %target, admin = %principal.id, "user deleted");
    Ok(())
}
