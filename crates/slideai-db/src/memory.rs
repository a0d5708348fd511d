//! In-memory implementations of the storage traits.
//!
//! Used by unit and integration tests across the workspace, and handy for
//! running the service without PostgreSQL. Nothing here is persistent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use slideai_core::{
    Error, FileRecord, FileRecordRepository, FileState, Identity, IdentityStore, NewFileRecord,
    NewUsageEvent, Result, ServiceCounts, UsageEvent, UsageRepository,
};

use crate::file_storage::StorageBackend;

// =============================================================================
// IDENTITIES
// =============================================================================

/// Identity store backed by a map, with a lookup counter and outage switch.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<String, Identity>>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, identity: Identity) {
        self.identities
            .write()
            .await
            .insert(identity.key.clone(), identity);
    }

    pub async fn remove(&self, key: &str) -> Option<Identity> {
        self.identities.write().await.remove(key)
    }

    /// Number of `find_by_key` calls that reached the store.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Internal("identity store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Identity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.identities.read().await.get(key).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Identity>> {
        self.check_available()?;
        let mut all: Vec<Identity> = self.identities.read().await.values().cloned().collect();
        all.sort_by_key(|i| i.id);
        Ok(all)
    }
}

// =============================================================================
// USAGE EVENTS
// =============================================================================

/// Append-only usage event log.
#[derive(Default)]
pub struct MemoryUsageRepository {
    events: Mutex<Vec<UsageEvent>>,
}

impl MemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded event, in insertion order.
    pub async fn all(&self) -> Vec<UsageEvent> {
        self.events.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UsageRepository for MemoryUsageRepository {
    async fn insert(&self, event: NewUsageEvent) -> Result<UsageEvent> {
        let event = UsageEvent {
            id: Uuid::now_v7(),
            user_id: event.user_id,
            service_type: event.service_type,
            usage_date: event.usage_date,
        };
        self.events.lock().await.push(event.clone());
        Ok(event)
    }

    async fn count_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let events = self.events.lock().await;
        let count = events
            .iter()
            .filter(|e| e.user_id == user_id && e.usage_date >= start && e.usage_date < end)
            .count();
        Ok(count as i64)
    }

    async fn list_in_window(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageEvent>> {
        let events = self.events.lock().await;
        let mut matching: Vec<UsageEvent> = events
            .iter()
            .filter(|e| e.user_id == user_id && e.usage_date >= start && e.usage_date < end)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.usage_date);
        Ok(matching)
    }

    async fn count_by_service(&self, user_id: i64) -> Result<ServiceCounts> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.service_type)
            .collect())
    }
}

// =============================================================================
// FILE RECORDS
// =============================================================================

/// File record table keyed by id, enforcing unique storage locators.
#[derive(Default)]
pub struct MemoryFileRecordRepository {
    records: Mutex<HashMap<Uuid, FileRecord>>,
}

impl MemoryFileRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every record, oldest first.
    pub async fn all(&self) -> Vec<FileRecord> {
        let mut all: Vec<FileRecord> = self.records.lock().await.values().cloned().collect();
        all.sort_by_key(|r| (r.created_at, r.id));
        all
    }
}

fn sorted_limited<F>(mut records: Vec<FileRecord>, key: F, limit: i64) -> Vec<FileRecord>
where
    F: FnMut(&FileRecord) -> (DateTime<Utc>, Uuid),
{
    records.sort_by_key(key);
    records.truncate(limit.max(0) as usize);
    records
}

#[async_trait]
impl FileRecordRepository for MemoryFileRecordRepository {
    async fn insert(&self, req: NewFileRecord) -> Result<FileRecord> {
        let mut records = self.records.lock().await;
        if records.contains_key(&req.id) {
            return Err(Error::InvalidInput(format!("Duplicate file id {}", req.id)));
        }
        if records.values().any(|r| r.file_path == req.file_path) {
            return Err(Error::InvalidInput(format!(
                "Storage locator already in use: {}",
                req.file_path
            )));
        }

        let record = FileRecord {
            id: req.id,
            user_id: req.user_id,
            file_name: req.file_name,
            file_path: req.file_path,
            service_type: req.service_type,
            file_size: req.file_size,
            status: FileState::Processing,
            created_at: req.created_at,
            expires_at: req.expires_at,
            analysis_result: None,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn get_owned(&self, id: Uuid, user_id: i64) -> Result<Option<FileRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn mark_completed(&self, id: Uuid, analysis_result: &str) -> Result<Option<FileRecord>> {
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) if record.status == FileState::Processing => {
                record.status = FileState::Completed;
                record.analysis_result = Some(analysis_result.to_string());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) if record.status == FileState::Completed => {
                record.status = FileState::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_processing(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().await;
        let matches = records
            .get(&id)
            .is_some_and(|r| r.status == FileState::Processing);
        if matches {
            records.remove(&id);
        }
        Ok(matches)
    }

    async fn delete_completed_owned(&self, id: Uuid, user_id: i64) -> Result<bool> {
        let mut records = self.records.lock().await;
        let matches = records
            .get(&id)
            .is_some_and(|r| r.user_id == user_id && r.status == FileState::Completed);
        if matches {
            records.remove(&id);
        }
        Ok(matches)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<FileRecord>> {
        let records = self.records.lock().await;
        let mut owned: Vec<FileRecord> = records
            .values()
            .filter(|r| r.user_id == user_id && r.status != FileState::Expired)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        owned.truncate(limit.max(0) as usize);
        Ok(owned)
    }

    async fn list_expiring(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>> {
        let records = self.records.lock().await;
        let expiring = records
            .values()
            .filter(|r| {
                r.user_id == user_id
                    && r.status == FileState::Completed
                    && r.expires_at > now
                    && r.expires_at <= until
            })
            .cloned()
            .collect();
        Ok(sorted_limited(expiring, |r| (r.expires_at, r.id), limit))
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>> {
        let records = self.records.lock().await;
        let due = records
            .values()
            .filter(|r| r.status == FileState::Completed && r.expires_at <= now)
            .cloned()
            .collect();
        Ok(sorted_limited(due, |r| (r.expires_at, r.id), limit))
    }

    async fn list_abandoned(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<FileRecord>> {
        let records = self.records.lock().await;
        let stuck = records
            .values()
            .filter(|r| r.status == FileState::Processing && r.expires_at <= now)
            .cloned()
            .collect();
        Ok(sorted_limited(stuck, |r| (r.expires_at, r.id), limit))
    }
}

// =============================================================================
// BLOB STORAGE
// =============================================================================

/// Blob map with switches for failing writes and deletes.
///
/// A torn write keeps the blob but still reports failure, like a filesystem
/// write whose final permission change failed.
#[derive(Default)]
pub struct MemoryStorageBackend {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    torn_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_torn_writes(&self, torn: bool) {
        self.torn_writes.store(torn, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("write {} refused", path)));
        }
        self.blobs
            .write()
            .await
            .insert(path.to_string(), data.to_vec());
        if self.torn_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("write {} did not finish", path)));
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Stored file {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("remove {} refused", path)));
        }
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use slideai_core::ServiceType;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    fn new_record(user_id: i64, created_at: DateTime<Utc>) -> NewFileRecord {
        let id = Uuid::now_v7();
        NewFileRecord::new(
            id,
            user_id,
            "talk.mp4",
            format!("files/{}.bin", id),
            ServiceType::VideoAbstract,
            10,
            created_at,
            Duration::days(3),
        )
    }

    #[tokio::test]
    async fn test_identity_lookup_counts_calls() {
        let store = MemoryIdentityStore::new();
        store.insert(Identity::new(1, "a@example.com", false)).await;

        assert!(store.find_by_key("a@example.com").await.unwrap().is_some());
        assert!(store.find_by_key("b@example.com").await.unwrap().is_none());
        assert_eq!(store.lookup_count(), 2);

        store.set_unavailable(true);
        assert!(store.find_by_key("a@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_usage_window_is_half_open() {
        let repo = MemoryUsageRepository::new();
        for h in [0, 12, 23] {
            repo.insert(NewUsageEvent {
                user_id: 7,
                service_type: ServiceType::PptToVideo,
                usage_date: at(h),
            })
            .await
            .unwrap();
        }

        let start = at(0);
        let end = start + Duration::days(1);
        assert_eq!(repo.count_in_window(7, start, end).await.unwrap(), 3);
        assert_eq!(repo.count_in_window(7, at(12), end).await.unwrap(), 2);
        assert_eq!(repo.count_in_window(7, end, end + Duration::days(1)).await.unwrap(), 0);
        assert_eq!(repo.count_in_window(8, start, end).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_by_service_spans_all_days() {
        let repo = MemoryUsageRepository::new();
        let days_apart = [
            (ServiceType::VideoAbstract, at(1)),
            (ServiceType::VideoAbstract, at(1) - Duration::days(40)),
            (ServiceType::PptToVideo, at(2) + Duration::days(1)),
        ];
        for (service_type, usage_date) in days_apart {
            repo.insert(NewUsageEvent {
                user_id: 7,
                service_type,
                usage_date,
            })
            .await
            .unwrap();
        }

        let counts = repo.count_by_service(7).await.unwrap();
        assert_eq!((counts.video_abstract, counts.ppt_to_video), (2, 1));
        assert_eq!(counts.total(), 3);
        assert_eq!(repo.count_by_service(8).await.unwrap(), ServiceCounts::default());
    }

    #[tokio::test]
    async fn test_file_transitions_are_conditional() {
        let repo = MemoryFileRecordRepository::new();
        let rec = repo.insert(new_record(1, at(8))).await.unwrap();
        assert_eq!(rec.status, FileState::Processing);

        assert!(!repo.mark_expired(rec.id).await.unwrap());
        assert!(repo.mark_completed(rec.id, "ok").await.unwrap().is_some());
        assert!(repo.mark_completed(rec.id, "again").await.unwrap().is_none());
        assert!(!repo.delete_processing(rec.id).await.unwrap());

        assert!(repo.mark_expired(rec.id).await.unwrap());
        assert!(!repo.mark_expired(rec.id).await.unwrap());
        assert!(!repo.delete_completed_owned(rec.id, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_locator_rejected() {
        let repo = MemoryFileRecordRepository::new();
        let first = new_record(1, at(8));
        let mut second = new_record(1, at(9));
        second.file_path = first.file_path.clone();

        repo.insert(first).await.unwrap();
        assert!(repo.insert(second).await.is_err());
    }

    #[tokio::test]
    async fn test_owned_delete_requires_owner() {
        let repo = MemoryFileRecordRepository::new();
        let rec = repo.insert(new_record(1, at(8))).await.unwrap();
        repo.mark_completed(rec.id, "ok").await.unwrap();

        assert!(!repo.delete_completed_owned(rec.id, 2).await.unwrap());
        assert!(repo.get_owned(rec.id, 2).await.unwrap().is_none());
        assert!(repo.delete_completed_owned(rec.id, 1).await.unwrap());
        assert!(repo.get(rec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_for_expiry_respects_limit_and_order() {
        let repo = MemoryFileRecordRepository::new();
        for h in [3, 1, 2] {
            let rec = repo.insert(new_record(1, at(h))).await.unwrap();
            repo.mark_completed(rec.id, "ok").await.unwrap();
        }

        let now = at(3) + Duration::days(3);
        let due = repo.list_due_for_expiry(now, 2).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].created_at, at(1));
        assert_eq!(due[1].created_at, at(2));
    }

    #[tokio::test]
    async fn test_abandoned_lists_only_overdue_processing() {
        let repo = MemoryFileRecordRepository::new();
        let stuck = repo.insert(new_record(1, at(1))).await.unwrap();
        let done = repo.insert(new_record(1, at(1))).await.unwrap();
        repo.mark_completed(done.id, "ok").await.unwrap();
        repo.insert(new_record(1, at(5))).await.unwrap();

        let now = at(1) + Duration::days(3);
        let abandoned = repo.list_abandoned(now, 10).await.unwrap();
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].id, stuck.id);
        assert!(repo.list_abandoned(now - Duration::seconds(1), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_fault_switches() {
        let storage = MemoryStorageBackend::new();
        storage.write("files/a.bin", b"x").await.unwrap();

        storage.set_fail_deletes(true);
        assert!(storage.delete("files/a.bin").await.is_err());
        assert!(storage.exists("files/a.bin").await.unwrap());

        storage.set_fail_deletes(false);
        storage.delete("files/a.bin").await.unwrap();
        assert!(storage.is_empty().await);

        storage.set_fail_writes(true);
        assert!(storage.write("files/b.bin", b"y").await.is_err());
    }
}
