//! # slideai-service
//!
//! The ephemeral resource manager behind SlideAI uploads.
//!
//! This crate provides:
//! - [`IdentityCache`], a TTL cache in front of the identity store
//! - [`QuotaCounter`], the per-identity daily operation budget
//! - [`FileRegistry`], the stored-file lifecycle
//! - [`ResourceManager`], the facade wiring them to storage, analysis and
//!   the sweeper
//!
//! ## Example
//!
//! ```ignore
//! use slideai_service::{Collaborators, IncomingUpload, ResourceManager};
//!
//! let manager = ResourceManager::new(ResourceConfig::from_env(), collaborators);
//! let identity = manager.resolve_identity("user@example.com").await?;
//! let upload = IncomingUpload::new("deck.pdf", Some("application/pdf"), body);
//! let processed = manager
//!     .process_upload(&identity, ServiceType::PptToVideo, upload)
//!     .await?;
//! ```

pub mod analysis;
pub mod file_registry;
pub mod identity_cache;
pub mod quota;
pub mod upload;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use slideai_core::logging::{
    COMPONENT, DURATION_MS, ERROR_MSG, FILE_ID, OPERATION, RESULT_COUNT, SERVICE_TYPE, SUBSYSTEM,
    USER_ID,
};
use slideai_db::{
    Database, PgFileRecordRepository, PgIdentityStore, PgUsageRepository, StorageBackend,
};
use slideai_jobs::{SweepConfig, SweepReport, Sweeper};

// Re-export core types
pub use slideai_core::*;

pub use analysis::{AnalysisBackend, MockAnalysis, PlaceholderAnalysis};
pub use file_registry::FileRegistry;
pub use identity_cache::{CacheStats, CachedIdentity, IdentityCache};
pub use quota::{QuotaCounter, QuotaDecision, QuotaGrant};
pub use upload::{AcceptedUpload, IncomingUpload};

/// External collaborators of the resource manager.
#[derive(Clone)]
pub struct Collaborators {
    pub identities: Arc<dyn IdentityStore>,
    pub usage: Arc<dyn UsageRepository>,
    pub files: Arc<dyn FileRecordRepository>,
    pub storage: Arc<dyn StorageBackend>,
    pub analysis: Arc<dyn AnalysisBackend>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// PostgreSQL repositories sharing `db`'s pool, with the system clock.
    pub fn postgres(
        db: &Database,
        storage: Arc<dyn StorageBackend>,
        analysis: Arc<dyn AnalysisBackend>,
    ) -> Self {
        Self {
            identities: Arc::new(PgIdentityStore::new(db.pool.clone())),
            usage: Arc::new(PgUsageRepository::new(db.pool.clone())),
            files: Arc::new(PgFileRecordRepository::new(db.pool.clone())),
            storage,
            analysis,
            clock: Arc::new(SystemClock::new()),
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedUpload {
    pub file: FileRecord,
    pub result: String,
    pub retention_days: i64,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Outcome of the opportunistic sweep, `None` if it failed.
    pub sweep: Option<SweepReport>,
    pub max_video_upload_bytes: u64,
    pub max_pdf_upload_bytes: u64,
    pub daily_usage_limit: i64,
    pub retention_days: i64,
}

/// One identity's usage, for administrators.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityUsage {
    pub identity: Identity,
    pub status: UsageStatus,
    /// Events in the current UTC day.
    pub today: ServiceCounts,
    pub all_time: ServiceCounts,
}

/// Usage across every identity for the current UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyUsageSummary {
    pub date: chrono::NaiveDate,
    pub usage: ServiceCounts,
    /// Identities with at least one event today.
    pub active_identities: usize,
}

/// Ephemeral resource manager.
pub struct ResourceManager {
    config: ResourceConfig,
    clock: Arc<dyn Clock>,
    identities: Arc<dyn IdentityStore>,
    usage: Arc<dyn UsageRepository>,
    analysis: Arc<dyn AnalysisBackend>,
    cache: IdentityCache,
    quota: QuotaCounter,
    registry: FileRegistry,
    sweeper: Arc<Sweeper>,
}

impl ResourceManager {
    pub fn new(config: ResourceConfig, parts: Collaborators) -> Self {
        let cache = IdentityCache::new(config.identity_cache_ttl, parts.clock.clone());
        let quota = QuotaCounter::new(
            parts.usage.clone(),
            parts.clock.clone(),
            config.daily_usage_limit,
            config.quota_strict,
        );
        let registry = FileRegistry::new(
            parts.files.clone(),
            parts.storage.clone(),
            parts.clock.clone(),
            config.retention,
        );
        let sweeper = Arc::new(Sweeper::new(
            parts.files,
            parts.storage,
            parts.clock.clone(),
            SweepConfig::from(&config),
        ));

        Self {
            config,
            clock: parts.clock,
            identities: parts.identities,
            usage: parts.usage,
            analysis: parts.analysis,
            cache,
            quota,
            registry,
            sweeper,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn quota(&self) -> &QuotaCounter {
        &self.quota
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Shared sweeper, e.g. for driving a periodic `SweepWorker`.
    pub fn sweeper(&self) -> Arc<Sweeper> {
        self.sweeper.clone()
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Resolve an identity key, consulting the cache first.
    ///
    /// Unknown keys fail with [`Error::IdentityNotFound`] and are not cached.
    pub async fn resolve_identity(&self, key: &str) -> Result<Identity> {
        if let Some(identity) = self.cache.resolve(key).await {
            return Ok(identity);
        }

        let identity = self
            .identities
            .find_by_key(key)
            .await?
            .ok_or_else(|| Error::IdentityNotFound(key.to_string()))?;

        self.cache.store(key, identity.clone()).await;
        debug!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "resource_manager",
            { USER_ID } = identity.id,
            "Identity loaded from store"
        );
        Ok(identity)
    }

    // =========================================================================
    // QUOTA
    // =========================================================================

    pub async fn check_and_reserve(&self, identity: &Identity) -> Result<QuotaDecision> {
        self.quota.check_and_reserve(identity).await
    }

    pub async fn record_usage(
        &self,
        grant: QuotaGrant,
        service_type: ServiceType,
    ) -> Result<Option<UsageEvent>> {
        self.quota.record_usage(grant, service_type).await
    }

    pub async fn remaining_today(&self, identity: &Identity) -> Result<UsageStatus> {
        self.quota.remaining_today(identity).await
    }

    /// Today's and all-time usage of every known identity. Privileged
    /// callers only.
    pub async fn usage_statistics(&self, requester: &Identity) -> Result<Vec<IdentityUsage>> {
        Self::require_privileged(requester, "reading usage statistics")?;

        let mut report = Vec::new();
        for identity in self.identities.list_all().await? {
            let events = self.quota.usage_today(&identity).await?;
            let status = if identity.is_privileged {
                UsageStatus::privileged(self.quota.limit())
            } else {
                UsageStatus::from_count(events.len() as i64, self.quota.limit())
            };
            report.push(IdentityUsage {
                today: events.iter().map(|e| e.service_type).collect(),
                all_time: self.usage.count_by_service(identity.id).await?,
                identity,
                status,
            });
        }
        Ok(report)
    }

    /// Totals for the current UTC day across every identity. Privileged
    /// callers only.
    pub async fn daily_usage_summary(&self, requester: &Identity) -> Result<DailyUsageSummary> {
        Self::require_privileged(requester, "reading the usage summary")?;

        let mut summary = DailyUsageSummary {
            date: self.quota.day_window().start.date_naive(),
            usage: ServiceCounts::default(),
            active_identities: 0,
        };
        for entry in self.usage_statistics(requester).await? {
            if entry.today.total() > 0 {
                summary.active_identities += 1;
            }
            summary.usage += entry.today;
        }
        Ok(summary)
    }

    fn require_privileged(requester: &Identity, what: &str) -> Result<()> {
        if requester.is_privileged {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{} requires a privileged identity", what)))
        }
    }

    // =========================================================================
    // FILES
    // =========================================================================

    pub async fn create_file_record(
        &self,
        owner: &Identity,
        file_name: &str,
        service_type: ServiceType,
        data: &[u8],
    ) -> Result<FileRecord> {
        self.registry
            .create(owner, file_name, service_type, data)
            .await
    }

    pub async fn complete_file_record(&self, id: Uuid, analysis_result: &str) -> Result<FileRecord> {
        self.registry.complete(id, analysis_result).await
    }

    pub async fn rollback_file_record(&self, record: &FileRecord) -> Result<()> {
        self.registry.rollback(record).await
    }

    /// Owner delete. `false` when there was nothing to delete.
    pub async fn delete_file_record(&self, owner: &Identity, id: Uuid) -> Result<bool> {
        self.registry.delete(owner, id).await
    }

    /// Files expiring within the configured warning window.
    pub async fn expiring_soon(&self, owner: &Identity) -> Result<Vec<FileRecord>> {
        self.registry
            .expiring_soon(owner, self.config.expiry_warning)
            .await
    }

    pub async fn expiring_within(
        &self,
        owner: &Identity,
        window: chrono::Duration,
    ) -> Result<Vec<FileRecord>> {
        self.registry.expiring_soon(owner, window).await
    }

    pub async fn list_files(&self, owner: &Identity) -> Result<Vec<FileRecord>> {
        self.registry.list(owner).await
    }

    pub async fn get_file(&self, owner: &Identity, id: Uuid) -> Result<FileRecord> {
        self.registry.get(owner, id).await
    }

    /// Whole hours until `record` expires.
    pub fn hours_remaining(&self, record: &FileRecord) -> i64 {
        record.hours_remaining(self.clock.now())
    }

    // =========================================================================
    // PIPELINE
    // =========================================================================

    /// Run one billable operation end to end.
    ///
    /// Quota, then input checks, then storage and record, then analysis. A
    /// failure after the storage write rolls back the record and its storage
    /// before the error is returned. Usage is recorded only once the record
    /// is completed.
    pub async fn process_upload<R>(
        &self,
        identity: &Identity,
        service_type: ServiceType,
        upload: IncomingUpload<R>,
    ) -> Result<ProcessedUpload>
    where
        R: AsyncRead + Unpin,
    {
        let start = Instant::now();
        let grant = self.quota.check_and_reserve(identity).await?.into_grant()?;

        let accepted = upload::ingest(
            upload,
            service_type,
            self.config.max_upload_bytes(service_type),
        )
        .await?;

        let record = self
            .registry
            .create(identity, &accepted.file_name, service_type, &accepted.data)
            .await?;

        let outcome = async {
            let result = self
                .analysis
                .analyze(service_type, &record, &accepted.data)
                .await?;
            let file = self.registry.complete(record.id, &result).await?;
            Ok::<_, Error>((file, result))
        }
        .await;

        let (file, result) = match outcome {
            Ok(done) => done,
            Err(e) => {
                warn!(
                    { SUBSYSTEM } = "service",
                    { COMPONENT } = "resource_manager",
                    { OPERATION } = "process_upload",
                    { USER_ID } = identity.id,
                    { FILE_ID } = %record.id,
                    backend = self.analysis.name(),
                    { ERROR_MSG } = %e,
                    "Processing failed, rolling back"
                );
                if let Err(rollback) = self.registry.rollback(&record).await {
                    error!(
                        { SUBSYSTEM } = "service",
                        { COMPONENT } = "resource_manager",
                        { FILE_ID } = %record.id,
                        { ERROR_MSG } = %rollback,
                        "Rollback incomplete"
                    );
                }
                return Err(e);
            }
        };

        if let Err(e) = self.quota.record_usage(grant, service_type).await {
            error!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "resource_manager",
                { OPERATION } = "record_usage",
                { USER_ID } = identity.id,
                { FILE_ID } = %file.id,
                { ERROR_MSG } = %e,
                "Failed to record usage for completed operation"
            );
        }

        info!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "resource_manager",
            { OPERATION } = "process_upload",
            { USER_ID } = identity.id,
            { FILE_ID } = %file.id,
            { SERVICE_TYPE } = %service_type,
            { DURATION_MS } = start.elapsed().as_millis() as u64,
            "Upload processed"
        );

        Ok(ProcessedUpload {
            file,
            result,
            retention_days: self.config.retention_days(),
        })
    }

    // =========================================================================
    // SWEEPING
    // =========================================================================

    /// Expire up to `batch_limit` files past their deadline.
    pub async fn sweep(&self, batch_limit: i64) -> Result<SweepReport> {
        self.sweeper.sweep(batch_limit).await
    }

    /// Administrator-triggered sweep with the configured batch limit.
    pub async fn admin_sweep(&self, requester: &Identity) -> Result<SweepReport> {
        Self::require_privileged(requester, "sweeping")?;
        info!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "resource_manager",
            { OPERATION } = "admin_sweep",
            { USER_ID } = requester.id,
            "Sweep requested"
        );
        self.sweeper.run_once().await
    }

    /// Liveness probe. Runs an opportunistic sweep whose failure is logged
    /// and otherwise ignored.
    pub async fn health_probe(&self) -> HealthReport {
        let sweep = match self.sweeper.run_once().await {
            Ok(report) => {
                if report.processed > 0 {
                    debug!(
                        { SUBSYSTEM } = "service",
                        { COMPONENT } = "resource_manager",
                        { OPERATION } = "health_probe",
                        { RESULT_COUNT } = report.processed,
                        "Health probe swept expired files"
                    );
                }
                Some(report)
            }
            Err(e) => {
                warn!(
                    { SUBSYSTEM } = "service",
                    { COMPONENT } = "resource_manager",
                    { OPERATION } = "health_probe",
                    { ERROR_MSG } = %e,
                    "Opportunistic sweep failed"
                );
                None
            }
        };

        HealthReport {
            status: "healthy",
            timestamp: self.clock.now(),
            sweep,
            max_video_upload_bytes: self.config.max_video_upload_bytes,
            max_pdf_upload_bytes: self.config.max_pdf_upload_bytes,
            daily_usage_limit: self.config.daily_usage_limit,
            retention_days: self.config.retention_days(),
        }
    }
}
