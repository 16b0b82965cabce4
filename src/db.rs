use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::auth::repo::UserStore;
use crate::auth::repo_types::Role;
use crate::config::{AppConfig, SeedAdmin};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;
    Ok(db)
}

/// Creates the bootstrap admin unless an account with its email already exists.
pub async fn seed_admin(users: &dyn UserStore, seed: &SeedAdmin) -> anyhow::Result<()> {
    let email = seed.email.trim().to_lowercase();
    if let Some(existing) = users.find_by_email(&email).await? {
        info!(user_id = %existing.id, %email, "admin seed skipped: account exists");
        return Ok(());
    }

    let admin = users
        .create(&seed.username, &email, &seed.password, Role::Admin)
        .await
        .context("create seed admin")?;
    warn!(user_id = %admin.id, email = %admin.email, "seed admin created; change its password");
    Ok(())
}
