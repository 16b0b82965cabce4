use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::AuthResponse,
        guard::Principal,
        jwt::JwtKeys,
        password::{dummy_hash, verify_password},
        repo_types::{Role, User},
    },
    error::AppError,
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USERNAME_LEN: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Shape checks shared by self-registration and admin-created accounts.
pub(crate) fn validate_new_user(username: &str, email: &str, password: &str) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::validation("Username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation("Username is too long"));
    }
    if !is_valid_email(&email.trim().to_lowercase()) {
        return Err(AppError::validation("Invalid email"));
    }
    validate_password(password)
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Validates and stores a new account.
pub async fn create_account(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    validate_new_user(username, email, password)?;
    state
        .users
        .create(username, email, password, role)
        .await
        .map_err(AppError::store("User"))
}

/// Creates the account and signs a token for it. Whether `role` may be
/// `Admin` is decided by the caller's route, not here.
pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<AuthResponse, AppError> {
    let user = create_account(state, username, email, password, role).await?;

    let token = JwtKeys::from_ref(state).sign(user.id, user.role)?;
    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// Unknown identifier, wrong password and deactivated account all yield the
/// same `InvalidCredentials`.
pub async fn login(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<AuthResponse, AppError> {
    let identifier = identifier.trim();
    if identifier.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let found = if identifier.contains('@') {
        state.users.find_by_email(&identifier.to_lowercase()).await?
    } else {
        state.users.find_by_username(identifier).await?
    };

    let Some(user) = found else {
        // Burn the same hashing cost as a real check.
        let _ = verify_password(password, dummy_hash());
        warn!("login unknown identifier");
        return Err(AppError::InvalidCredentials);
    };

    let ok = verify_password(password, &user.password_hash).map_err(AppError::Unavailable)?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(AppError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(state).sign(user.id, user.role)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// Verifies `token` and reloads its subject. Deleted or deactivated users
/// are rejected, and the stored role wins over the role in the claims.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Principal, AppError> {
    let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::from(e)
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthenticated("User no longer exists"))?;
    if !user.is_active {
        warn!(user_id = %user.id, "token for deactivated account");
        return Err(AppError::Unauthenticated("Account is deactivated"));
    }

    Ok(Principal {
        id: user.id,
        role: user.role,
    })
}

pub async fn current_user(state: &AppState, principal: &Principal) -> Result<User, AppError> {
    state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or(AppError::NotFound("User"))
}
