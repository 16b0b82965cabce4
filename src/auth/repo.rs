use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::auth::repo_types::{NewUserRecord, Role, User, UserChanges, UserPatch};
use crate::store::{map_db_err, StoreError};

/// Credential and identity store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, record: NewUserRecord) -> Result<User, StoreError>;
    /// `email` must already be lower-cased.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    async fn apply(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;

    /// Normalizes username/email and hashes the password before inserting.
    async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let password_hash = hash_password(password)?;
        self.insert(NewUserRecord {
            username: username.trim().to_string(),
            email: email.trim().to_lowercase(),
            password_hash,
            role,
        })
        .await
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        let password_hash = match patch.password.as_deref() {
            Some(plain) => Some(hash_password(plain)?),
            None => None,
        };
        self.apply(
            id,
            UserChanges {
                role: patch.role,
                is_active: patch.is_active,
                password_hash,
            },
        )
        .await
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, record: NewUserRecord) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, role, is_active, created_at, updated_at
            "#,
        )
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(record.role)
        .fetch_one(&self.db)
        .await
        .map_err(map_db_err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE lower(email) = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn apply(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET role = COALESCE($2, role),
                   is_active = COALESCE($3, is_active),
                   password_hash = COALESCE($4, password_hash),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, password_hash, role, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.role)
        .bind(changes.is_active)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_err)?
        .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_active, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
