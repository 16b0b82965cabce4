use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// S3-compatible object store holding slip images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base used to build the stored image URL, e.g. `https://cdn.example.com/slips`.
    pub public_url: String,
}

/// Admin account created on start-up when no user owns `email` yet.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub client_url: String,
    pub storage: Option<StorageConfig>,
    pub seed_admin: Option<SeedAdmin>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "checkslip".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "checkslip-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60 * 24),
        };
        let client_url =
            std::env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".into());

        Ok(Self {
            database_url,
            max_connections,
            jwt,
            client_url,
            storage: storage_from_env(),
            seed_admin: seed_admin_from_env(),
        })
    }
}

fn storage_from_env() -> Option<StorageConfig> {
    let endpoint = std::env::var("STORAGE_ENDPOINT").ok()?;
    let bucket = std::env::var("STORAGE_BUCKET").ok()?;
    let public_url = std::env::var("STORAGE_PUBLIC_URL")
        .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
    Some(StorageConfig {
        access_key: std::env::var("STORAGE_ACCESS_KEY").ok()?,
        secret_key: std::env::var("STORAGE_SECRET_KEY").ok()?,
        region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
        endpoint,
        bucket,
        public_url,
    })
}

fn seed_admin_from_env() -> Option<SeedAdmin> {
    Some(SeedAdmin {
        username: std::env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".into()),
        email: std::env::var("SEED_ADMIN_EMAIL").ok()?,
        password: std::env::var("SEED_ADMIN_PASSWORD").ok()?,
    })
}
