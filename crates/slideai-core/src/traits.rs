//! Core traits for the resource manager's external collaborators.
//!
//! These traits define the interfaces that concrete implementations
//! (PostgreSQL, in-memory) must satisfy, enabling pluggable backends and
//! deterministic tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// IDENTITY STORE
// =============================================================================

/// Read-only view of the external identity store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by its key.
    async fn find_by_key(&self, key: &str) -> Result<Option<Identity>>;

    /// List every identity (administrative aggregation).
    async fn list_all(&self) -> Result<Vec<Identity>>;
}

// =============================================================================
// USAGE REPOSITORY
// =============================================================================

/// Append-only storage of usage events.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Persist one usage event.
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent>;

    /// Count an identity's events with `start <= usage_date < end`.
    async fn count_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64>;

    /// List an identity's events with `start <= usage_date < end`, oldest first.
    async fn list_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageEvent>>;

    /// An identity's events of all time, per service type.
    async fn count_by_service(&self, user_id: i64) -> Result<ServiceCounts>;
}

// =============================================================================
// FILE RECORD REPOSITORY
// =============================================================================

/// Storage of file records.
///
/// State-changing methods are conditional on the current state and return
/// `false` when the row was not in the expected state (or is gone), so
/// repeated triggers are no-ops.
#[async_trait]
pub trait FileRecordRepository: Send + Sync {
    /// Insert a record in state `processing`.
    async fn insert(&self, req: NewFileRecord) -> Result<FileRecord>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>>;

    /// Fetch a record by id only if `user_id` owns it.
    async fn get_owned(&self, id: Uuid, user_id: i64) -> Result<Option<FileRecord>>;

    /// `processing -> completed`, storing the analysis result.
    async fn mark_completed(&self, id: Uuid, analysis_result: &str) -> Result<Option<FileRecord>>;

    /// `completed -> expired`.
    async fn mark_expired(&self, id: Uuid) -> Result<bool>;

    /// Remove a record in state `processing` (rollback).
    async fn delete_processing(&self, id: Uuid) -> Result<bool>;

    /// Remove a `completed` record owned by `user_id`.
    async fn delete_completed_owned(&self, id: Uuid, user_id: i64) -> Result<bool>;

    /// An identity's non-expired records, newest first.
    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<FileRecord>>;

    /// An identity's `completed` records with `now < expires_at <= until`.
    async fn list_expiring(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>>;

    /// `completed` records with `expires_at <= now`, earliest deadline first.
    async fn list_due_for_expiry(&self, now: DateTime<Utc>, limit: i64)
        -> Result<Vec<FileRecord>>;

    /// `processing` records with `expires_at <= now`: operations whose
    /// caller went away before completing or rolling back.
    async fn list_abandoned(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<FileRecord>>;
}
