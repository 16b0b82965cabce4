use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod response;
mod slips;
mod state;
mod storage;
mod store;
mod users;

#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "checkslip=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config).await?;
    let app_state = AppState::init(config.clone(), pool).await?;

    if let Some(seed) = &config.seed_admin {
        db::seed_admin(app_state.users.as_ref(), seed).await?;
    }

    app::serve(app::build_app(app_state)).await
}
