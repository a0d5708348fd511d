//! Bounded-batch reclamation of expired files.
//!
//! A sweep selects `completed` records whose deadline has passed, removes
//! their backing storage and marks them `expired`. Every step is conditional
//! on the record's current state, so overlapping sweeps (opportunistic and
//! periodic) never process the same record twice.
//!
//! The same pass reclaims `processing` records past their deadline. Those
//! belong to operations whose caller vanished (dropped future, crashed
//! process) before completing or rolling back; their storage is removed and
//! then the row, as a rollback would.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use slideai_core::logging::{
    COMPONENT, DURATION_MS, ERROR_MSG, FILE_ID, OPERATION, RESULT_COUNT, STORAGE_PATH, SUBSYSTEM,
};
use slideai_core::{Clock, FileRecord, FileRecordRepository, ResourceConfig, Result};
use slideai_db::StorageBackend;

/// Sweep behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Records examined per pass.
    pub batch_limit: i64,
    /// Leave a record `completed` when its storage removal fails so a later
    /// pass retries it. Off by default: the record is expired regardless.
    pub keep_on_storage_failure: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_limit: slideai_core::defaults::SWEEP_BATCH_LIMIT,
            keep_on_storage_failure: slideai_core::defaults::SWEEP_KEEP_ON_STORAGE_FAILURE,
        }
    }
}

impl From<&ResourceConfig> for SweepConfig {
    fn from(config: &ResourceConfig) -> Self {
        Self {
            batch_limit: config.sweep_batch_limit,
            keep_on_storage_failure: config.sweep_keep_on_storage_failure,
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Due records selected.
    pub examined: usize,
    /// Records this pass moved to `expired`.
    pub processed: usize,
    /// Storage removals that failed.
    pub storage_failures: usize,
    /// Records left `completed` after a storage failure.
    pub retained: usize,
    /// Records whose state update failed.
    pub record_failures: usize,
    /// Abandoned `processing` records removed with their storage.
    pub reclaimed: usize,
}

/// Sweep Scheduler.
pub struct Sweeper {
    files: Arc<dyn FileRecordRepository>,
    storage: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(
        files: Arc<dyn FileRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        config: SweepConfig,
    ) -> Self {
        Self {
            files,
            storage,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Sweep with the configured batch limit.
    pub async fn run_once(&self) -> Result<SweepReport> {
        self.sweep(self.config.batch_limit).await
    }

    /// Expire up to `batch_limit` due records.
    ///
    /// Only the selection query can fail the pass; per-record failures are
    /// logged and counted in the report.
    pub async fn sweep(&self, batch_limit: i64) -> Result<SweepReport> {
        let start = Instant::now();
        let now = self.clock.now();
        let due = self.files.list_due_for_expiry(now, batch_limit).await?;
        let budget = batch_limit - due.len() as i64;
        let abandoned = if budget > 0 {
            self.files.list_abandoned(now, budget).await?
        } else {
            Vec::new()
        };

        let mut report = SweepReport {
            examined: due.len() + abandoned.len(),
            ..SweepReport::default()
        };

        for record in due {
            trace!(
                { SUBSYSTEM } = "jobs",
                { COMPONENT } = "sweeper",
                { FILE_ID } = %record.id,
                expires_at = %record.expires_at,
                "Expiring file"
            );

            if let Err(e) = self.storage.delete(&record.file_path).await {
                report.storage_failures += 1;
                warn!(
                    { SUBSYSTEM } = "jobs",
                    { COMPONENT } = "sweeper",
                    { OPERATION } = "remove_storage",
                    { FILE_ID } = %record.id,
                    { STORAGE_PATH } = %record.file_path,
                    { ERROR_MSG } = %e,
                    "Storage removal failed"
                );
                if self.config.keep_on_storage_failure {
                    report.retained += 1;
                    continue;
                }
            }

            match self.files.mark_expired(record.id).await {
                Ok(true) => report.processed += 1,
                Ok(false) => debug!(
                    { SUBSYSTEM } = "jobs",
                    { COMPONENT } = "sweeper",
                    { FILE_ID } = %record.id,
                    "Record already left completed state"
                ),
                Err(e) => {
                    report.record_failures += 1;
                    error!(
                        { SUBSYSTEM } = "jobs",
                        { COMPONENT } = "sweeper",
                        { OPERATION } = "mark_expired",
                        { FILE_ID } = %record.id,
                        { ERROR_MSG } = %e,
                        "Failed to mark file expired"
                    );
                }
            }
        }

        for record in abandoned {
            self.reclaim(&record, &mut report).await;
        }

        if report.examined > 0 {
            info!(
                { SUBSYSTEM } = "jobs",
                { COMPONENT } = "sweeper",
                { OPERATION } = "sweep",
                { RESULT_COUNT } = report.processed,
                storage_failures = report.storage_failures,
                retained = report.retained,
                reclaimed = report.reclaimed,
                { DURATION_MS } = start.elapsed().as_millis() as u64,
                "Sweep completed"
            );
        } else {
            debug!(
                { SUBSYSTEM } = "jobs",
                { COMPONENT } = "sweeper",
                { OPERATION } = "sweep",
                "Nothing due for expiry"
            );
        }

        Ok(report)
    }

    /// `processing -> failed_rollback` for a record nobody will finish.
    ///
    /// Storage goes first; when it cannot be removed the row stays so the
    /// next pass retries, leaving no blob without a record.
    async fn reclaim(&self, record: &FileRecord, report: &mut SweepReport) {
        if let Err(e) = self.storage.delete(&record.file_path).await {
            report.storage_failures += 1;
            warn!(
                { SUBSYSTEM } = "jobs",
                { COMPONENT } = "sweeper",
                { OPERATION } = "reclaim",
                { FILE_ID } = %record.id,
                { STORAGE_PATH } = %record.file_path,
                { ERROR_MSG } = %e,
                "Abandoned file storage removal failed, retrying next pass"
            );
            return;
        }

        match self.files.delete_processing(record.id).await {
            Ok(true) => {
                report.reclaimed += 1;
                info!(
                    { SUBSYSTEM } = "jobs",
                    { COMPONENT } = "sweeper",
                    { OPERATION } = "reclaim",
                    { FILE_ID } = %record.id,
                    created_at = %record.created_at,
                    "Reclaimed abandoned file"
                );
            }
            Ok(false) => debug!(
                { SUBSYSTEM } = "jobs",
                { COMPONENT } = "sweeper",
                { FILE_ID } = %record.id,
                "Abandoned record already gone"
            ),
            Err(e) => {
                report.record_failures += 1;
                error!(
                    { SUBSYSTEM } = "jobs",
                    { COMPONENT } = "sweeper",
                    { OPERATION } = "reclaim",
                    { FILE_ID } = %record.id,
                    { ERROR_MSG } = %e,
                    "Failed to remove abandoned record"
                );
            }
        }
    }
}
