use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::slips::repo::{PgSlipStore, SlipStore};
use crate::storage::{DisabledStorage, Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub slips: Arc<dyn SlipStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init(config: Arc<AppConfig>, db: PgPool) -> anyhow::Result<Self> {
        let storage = match &config.storage {
            Some(cfg) => Arc::new(Storage::new(cfg).await?) as Arc<dyn StorageClient>,
            None => {
                tracing::warn!("object storage not configured; image upload disabled");
                Arc::new(DisabledStorage) as Arc<dyn StorageClient>
            }
        };

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgSlipStore::new(db)),
            storage,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        slips: Arc<dyn SlipStore>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            slips,
            storage,
        }
    }
}
