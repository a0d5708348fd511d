//! Read-only identity lookups against the external `users` table.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use slideai_core::{Error, Identity, IdentityStore, Result};

/// PostgreSQL identity store.
///
/// Reads `id`, `email` and `is_admin`; credential columns are never selected.
pub struct PgIdentityStore {
    pool: Pool<Postgres>,
}

impl PgIdentityStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn identity_from_row(row: &sqlx::postgres::PgRow) -> Identity {
        Identity {
            id: row.get("id"),
            key: row.get("email"),
            is_privileged: row.get("is_admin"),
        }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(
            "SELECT id::BIGINT AS id, email, COALESCE(is_admin, false) AS is_admin
             FROM users WHERE email = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::identity_from_row))
    }

    async fn list_all(&self) -> Result<Vec<Identity>> {
        let rows = sqlx::query(
            "SELECT id::BIGINT AS id, email, COALESCE(is_admin, false) AS is_admin
             FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::identity_from_row).collect())
    }
}
