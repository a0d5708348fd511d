//! Usage event repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use slideai_core::{
    Error, NewUsageEvent, Result, ServiceCounts, ServiceType, UsageEvent, UsageRepository,
};

/// PostgreSQL usage event repository. Rows are only ever inserted.
pub struct PgUsageRepository {
    pool: Pool<Postgres>,
}

impl PgUsageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_service_type(raw: &str) -> Result<ServiceType> {
    raw.parse().map_err(Error::Serialization)
}

fn usage_event_from_row(row: &sqlx::postgres::PgRow) -> Result<UsageEvent> {
    let service_type: String = row.get("service_type");
    Ok(UsageEvent {
        id: row.get("id"),
        user_id: row.get("user_id"),
        service_type: parse_service_type(&service_type)?,
        usage_date: row.get("usage_date"),
    })
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO usage_events (id, user_id, service_type, usage_date)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(event.user_id)
        .bind(event.service_type.as_str())
        .bind(event.usage_date)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(UsageEvent {
            id,
            user_id: event.user_id,
            service_type: event.service_type,
            usage_date: event.usage_date,
        })
    }

    async fn count_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM usage_events
             WHERE user_id = $1 AND usage_date >= $2 AND usage_date < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn list_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageEvent>> {
        let rows = sqlx::query(
            "SELECT id, user_id, service_type, usage_date FROM usage_events
             WHERE user_id = $1 AND usage_date >= $2 AND usage_date < $3
             ORDER BY usage_date ASC",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(usage_event_from_row).collect()
    }

    async fn count_by_service(&self, user_id: i64) -> Result<ServiceCounts> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE service_type = 'video_abstract') AS video_abstract,
                 COUNT(*) FILTER (WHERE service_type = 'ppt_to_video') AS ppt_to_video
             FROM usage_events
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ServiceCounts {
            video_abstract: row.get("video_abstract"),
            ppt_to_video: row.get("ppt_to_video"),
        })
    }
}
