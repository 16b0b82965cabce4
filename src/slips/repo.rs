use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::slips::repo_types::{Decision, NewSlip, Slip, SlipFilter, SlipStats, SlipStatus};
use crate::store::{map_db_err, StoreError};

/// Slip record store.
#[async_trait]
pub trait SlipStore: Send + Sync {
    async fn create(&self, new: NewSlip) -> Result<Slip, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Slip>, StoreError>;
    async fn list(&self, filter: &SlipFilter) -> Result<Vec<Slip>, StoreError>;
    /// Moves a `pending` slip to `decision` in one indivisible step. Any other
    /// current status yields `InvalidTransition`.
    async fn set_resolution(
        &self,
        id: Uuid,
        resolver_id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Slip, StoreError>;
    async fn stats(&self) -> Result<SlipStats, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<Slip, StoreError>;
}

#[derive(Clone)]
pub struct PgSlipStore {
    db: PgPool,
}

impl PgSlipStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SlipStore for PgSlipStore {
    async fn create(&self, new: NewSlip) -> Result<Slip, StoreError> {
        sqlx::query_as::<_, Slip>(
            r#"
            INSERT INTO slips (slip_number, amount, image_url, image_provider_id, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, slip_number, amount, image_url, image_provider_id, status,
                      created_by, verified_by, notes, created_at, updated_at
            "#,
        )
        .bind(&new.slip_number)
        .bind(new.amount)
        .bind(&new.image.url)
        .bind(&new.image.provider_id)
        .bind(new.created_by)
        .fetch_one(&self.db)
        .await
        .map_err(map_db_err)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Slip>, StoreError> {
        let slip = sqlx::query_as::<_, Slip>(
            r#"
            SELECT id, slip_number, amount, image_url, image_provider_id, status,
                   created_by, verified_by, notes, created_at, updated_at
            FROM slips
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(slip)
    }

    async fn list(&self, filter: &SlipFilter) -> Result<Vec<Slip>, StoreError> {
        let rows = sqlx::query_as::<_, Slip>(
            r#"
            SELECT id, slip_number, amount, image_url, image_provider_id, status,
                   created_by, verified_by, notes, created_at, updated_at
            FROM slips
            WHERE ($1::slip_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR created_by = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.status)
        .bind(filter.created_by)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn set_resolution(
        &self,
        id: Uuid,
        resolver_id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Slip, StoreError> {
        // The status predicate makes check-and-write a single statement.
        let updated = sqlx::query_as::<_, Slip>(
            r#"
            UPDATE slips
               SET status = $3,
                   verified_by = $2,
                   notes = COALESCE($4, notes),
                   updated_at = now()
             WHERE id = $1 AND status = 'pending'
            RETURNING id, slip_number, amount, image_url, image_provider_id, status,
                      created_by, verified_by, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(resolver_id)
        .bind(SlipStatus::from(decision))
        .bind(notes)
        .fetch_optional(&self.db)
        .await?;

        if let Some(slip) = updated {
            return Ok(slip);
        }
        match self.find_by_id(id).await? {
            Some(current) => Err(StoreError::InvalidTransition(current.status)),
            None => Err(StoreError::NotFound),
        }
    }

    async fn stats(&self) -> Result<SlipStats, StoreError> {
        let rows = sqlx::query_as::<_, (SlipStatus, i64)>(
            r#"
            SELECT status, COUNT(*)
              FROM slips
             GROUP BY status
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut stats = SlipStats::default();
        for (status, count) in rows {
            stats.add(status, count);
        }
        Ok(stats)
    }

    async fn delete(&self, id: Uuid) -> Result<Slip, StoreError> {
        sqlx::query_as::<_, Slip>(
            r#"
            DELETE FROM slips
             WHERE id = $1
            RETURNING id, slip_number, amount, image_url, image_provider_id, status,
                      created_by, verified_by, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }
}
