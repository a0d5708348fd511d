//! File record repository implementation.
//!
//! Every state change is a conditional statement keyed on the current status,
//! so a transition applies at most once even under concurrent triggers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use slideai_core::{
    Error, FileRecord, FileRecordRepository, FileState, NewFileRecord, Result,
};

use crate::usage::parse_service_type;

const FILE_COLUMNS: &str = "id, user_id, file_name, file_path, service_type, file_size, status, \
                            created_at, expires_at, analysis_result";

/// PostgreSQL file record repository.
pub struct PgFileRecordRepository {
    pool: Pool<Postgres>,
}

impl PgFileRecordRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn parse_file_state(raw: &str) -> Result<FileState> {
    raw.parse().map_err(Error::Serialization)
}

fn file_record_from_row(row: &sqlx::postgres::PgRow) -> Result<FileRecord> {
    let service_type: String = row.get("service_type");
    let status: String = row.get("status");
    Ok(FileRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        service_type: parse_service_type(&service_type)?,
        file_size: row.get("file_size"),
        status: parse_file_state(&status)?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        analysis_result: row.get("analysis_result"),
    })
}

fn file_records_from_rows(rows: &[sqlx::postgres::PgRow]) -> Result<Vec<FileRecord>> {
    rows.iter().map(file_record_from_row).collect()
}

#[async_trait]
impl FileRecordRepository for PgFileRecordRepository {
    async fn insert(&self, req: NewFileRecord) -> Result<FileRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO user_files
                (id, user_id, file_name, file_path, service_type, file_size, status,
                 created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'processing', $7, $8)
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(req.id)
        .bind(req.user_id)
        .bind(&req.file_name)
        .bind(&req.file_path)
        .bind(req.service_type.as_str())
        .bind(req.file_size)
        .bind(req.created_at)
        .bind(req.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        file_record_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let row = sqlx::query(&format!("SELECT {FILE_COLUMNS} FROM user_files WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(file_record_from_row).transpose()
    }

    async fn get_owned(&self, id: Uuid, user_id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM user_files WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(file_record_from_row).transpose()
    }

    async fn mark_completed(&self, id: Uuid, analysis_result: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(&format!(
            "UPDATE user_files SET status = 'completed', analysis_result = $2
             WHERE id = $1 AND status = 'processing'
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(id)
        .bind(analysis_result)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(file_record_from_row).transpose()
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_files SET status = 'expired' WHERE id = $1 AND status = 'completed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_processing(&self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_files WHERE id = $1 AND status = 'processing'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_completed_owned(&self, id: Uuid, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM user_files WHERE id = $1 AND user_id = $2 AND status = 'completed'",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM user_files
             WHERE user_id = $1 AND status <> 'expired'
             ORDER BY created_at DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        file_records_from_rows(&rows)
    }

    async fn list_expiring(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM user_files
             WHERE user_id = $1 AND status = 'completed'
               AND expires_at > $2 AND expires_at <= $3
             ORDER BY expires_at ASC
             LIMIT $4"
        ))
        .bind(user_id)
        .bind(now)
        .bind(until)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        file_records_from_rows(&rows)
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM user_files
             WHERE status = 'completed' AND expires_at <= $1
             ORDER BY expires_at ASC
             LIMIT $2"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        file_records_from_rows(&rows)
    }

    async fn list_abandoned(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM user_files
             WHERE status = 'processing' AND expires_at <= $1
             ORDER BY expires_at ASC
             LIMIT $2"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        file_records_from_rows(&rows)
    }
}
