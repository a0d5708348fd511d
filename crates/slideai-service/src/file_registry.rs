//! File lifecycle tracking.
//!
//! ```text
//! processing ──complete──▶ completed ──sweep──▶ expired
//!     │                        │
//!  rollback                 delete
//!     ▼                        ▼
//! failed_rollback        deleted_by_owner
//! ```
//!
//! `failed_rollback` and `deleted_by_owner` are never stored: reaching them
//! removes both the record and its backing storage. `expires_at` is fixed at
//! creation and no transition touches it.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use slideai_core::defaults;
use slideai_core::logging::{
    COMPONENT, ERROR_MSG, FILE_ID, OPERATION, RESULT_COUNT, SERVICE_TYPE, SIZE_BYTES,
    STORAGE_PATH, SUBSYSTEM, USER_ID,
};
use slideai_core::{
    Clock, Error, FileRecord, FileRecordRepository, FileState, Identity, NewFileRecord, Result,
    ServiceType,
};
use slideai_db::{generate_storage_path, StorageBackend};

/// File Registry.
pub struct FileRegistry {
    files: Arc<dyn FileRecordRepository>,
    storage: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
}

impl FileRegistry {
    pub fn new(
        files: Arc<dyn FileRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            files,
            storage,
            clock,
            retention,
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        self.retention
    }

    /// Write `data` to fresh storage and register it as `processing`.
    ///
    /// The blob is removed again if the write reports failure or the record
    /// cannot be inserted, so a failed create leaves nothing behind.
    pub async fn create(
        &self,
        owner: &Identity,
        file_name: &str,
        service_type: ServiceType,
        data: &[u8],
    ) -> Result<FileRecord> {
        let id = Uuid::now_v7();
        let path = generate_storage_path(&id);
        if let Err(e) = self.storage.write(&path, data).await {
            self.discard_blob(&path, "write").await;
            return Err(e);
        }

        let request = NewFileRecord::new(
            id,
            owner.id,
            file_name,
            path.clone(),
            service_type,
            data.len() as i64,
            self.clock.now(),
            self.retention,
        );

        match self.files.insert(request).await {
            Ok(record) => {
                info!(
                    { SUBSYSTEM } = "service",
                    { COMPONENT } = "file_registry",
                    { OPERATION } = "create",
                    { USER_ID } = owner.id,
                    { FILE_ID } = %record.id,
                    { SERVICE_TYPE } = %service_type,
                    { SIZE_BYTES } = record.file_size,
                    "File registered"
                );
                Ok(record)
            }
            Err(e) => {
                self.discard_blob(&path, "insert").await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of a blob whose create did not go through.
    async fn discard_blob(&self, path: &str, failed_step: &'static str) {
        if let Err(cleanup) = self.storage.delete(path).await {
            warn!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "file_registry",
                { OPERATION } = "create",
                { STORAGE_PATH } = %path,
                failed_step,
                { ERROR_MSG } = %cleanup,
                "Failed to remove blob of aborted create"
            );
        }
    }

    /// `processing -> completed`, attaching the analysis result.
    pub async fn complete(&self, id: Uuid, analysis_result: &str) -> Result<FileRecord> {
        if let Some(record) = self.files.mark_completed(id, analysis_result).await? {
            debug!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "file_registry",
                { OPERATION } = "complete",
                { FILE_ID } = %id,
                "File completed"
            );
            return Ok(record);
        }

        match self.files.get(id).await? {
            Some(record) => {
                record.status.ensure_transition(FileState::Completed)?;
                // Unreachable unless the row changed between the two reads.
                Err(Error::Internal(format!("File {} changed state concurrently", id)))
            }
            None => Err(Error::NotFound(format!("File {} not found", id))),
        }
    }

    /// `processing -> failed_rollback`: drop the record, then its storage.
    ///
    /// A storage failure is logged with the locator and returned.
    pub async fn rollback(&self, record: &FileRecord) -> Result<()> {
        let removed = self.files.delete_processing(record.id).await?;
        if !removed {
            if let Some(current) = self.files.get(record.id).await? {
                current.status.ensure_transition(FileState::FailedRollback)?;
            }
        }

        if let Err(e) = self.storage.delete(&record.file_path).await {
            warn!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "file_registry",
                { OPERATION } = "rollback",
                { FILE_ID } = %record.id,
                { STORAGE_PATH } = %record.file_path,
                { ERROR_MSG } = %e,
                "Rollback could not remove storage"
            );
            return Err(e);
        }

        info!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "file_registry",
            { OPERATION } = "rollback",
            { FILE_ID } = %record.id,
            "File rolled back"
        );
        Ok(())
    }

    /// Owner delete, `completed -> deleted_by_owner`.
    ///
    /// Returns `false` when there is nothing to delete: the file is absent,
    /// owned by someone else or already expired. Deleting a file that is
    /// still processing is an invalid transition.
    pub async fn delete(&self, owner: &Identity, id: Uuid) -> Result<bool> {
        let Some(record) = self.files.get_owned(id, owner.id).await? else {
            return Ok(false);
        };

        match record.status {
            FileState::Completed => {}
            FileState::Processing => {
                record.status.ensure_transition(FileState::DeletedByOwner)?;
            }
            _ => return Ok(false),
        }

        self.storage.delete(&record.file_path).await?;
        let deleted = self.files.delete_completed_owned(id, owner.id).await?;

        if deleted {
            info!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "file_registry",
                { OPERATION } = "delete",
                { USER_ID } = owner.id,
                { FILE_ID } = %id,
                "File deleted by owner"
            );
        }
        Ok(deleted)
    }

    /// `completed` files of `owner` with `now < expires_at <= now + window`.
    pub async fn expiring_soon(
        &self,
        owner: &Identity,
        window: chrono::Duration,
    ) -> Result<Vec<FileRecord>> {
        let now = self.clock.now();
        let records = self
            .files
            .list_expiring(owner.id, now, now + window, defaults::EXPIRING_LIST_LIMIT)
            .await?;
        debug!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "file_registry",
            { OPERATION } = "expiring_soon",
            { USER_ID } = owner.id,
            { RESULT_COUNT } = records.len(),
            "Listed expiring files"
        );
        Ok(records)
    }

    /// Non-expired files of `owner`, newest first.
    pub async fn list(&self, owner: &Identity) -> Result<Vec<FileRecord>> {
        self.files
            .list_by_user(owner.id, defaults::FILE_LIST_LIMIT)
            .await
    }

    /// Owner-scoped lookup.
    pub async fn get(&self, owner: &Identity, id: Uuid) -> Result<FileRecord> {
        self.files
            .get_owned(id, owner.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("File {} not found", id)))
    }
}
