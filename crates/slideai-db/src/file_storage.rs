//! Backing storage for uploaded files.
//!
//! Blobs are addressed by a storage locator derived from the owning record's
//! UUID, so a locator is unique as long as record ids are.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use slideai_core::logging::{COMPONENT, ERROR_MSG, OPERATION, SIZE_BYTES, STORAGE_PATH, SUBSYSTEM};
use slideai_core::{Error, Result};

/// Storage backend abstraction (filesystem, object store, in-memory).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the locator, overwriting any existing blob there.
    ///
    /// On error nothing is left at the locator or beside it.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove data at the locator. Removing an absent locator succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend.
///
/// Path format: `{base_path}/files/{first-2-hex}/{next-2-hex}/{uuid}.bin`
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = std::path::Path::new(path);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if path.is_empty() || escapes {
            return Err(Error::Storage(format!("Invalid storage locator: {}", path)));
        }
        Ok(self.base_path.join(relative))
    }

    /// Round-trip a probe file to surface permission or mount problems at startup.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join("files/.health-check");
        let test_file = test_dir.join("probe.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }

    /// Write `data` to `temp_path`, then move it to `full_path` as 0644.
    async fn commit(
        temp_path: &std::path::Path,
        full_path: &std::path::Path,
        path: &str,
        data: &[u8],
    ) -> Result<()> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {}", temp_path.display(), e)))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", path, e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("sync {}: {}", path, e)))?;
        drop(file);

        fs::rename(temp_path, full_path).await.map_err(|e| {
            warn!({ STORAGE_PATH } = %path, { ERROR_MSG } = %e, "rename failed");
            Error::Storage(format!("rename into {}: {}", path, e))
        })?;

        // never executable
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(full_path, std::fs::Permissions::from_mode(0o644))
                .await
                .map_err(|e| Error::Storage(format!("chmod {}: {}", path, e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(
            { SUBSYSTEM } = "storage",
            { COMPONENT } = "filesystem",
            { OPERATION } = "write",
            { STORAGE_PATH } = %path,
            { SIZE_BYTES } = data.len(),
            "Writing blob"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!({ STORAGE_PATH } = %path, { ERROR_MSG } = %e, "create_dir_all failed");
                Error::Storage(format!("create directory for {}: {}", path, e))
            })?;
        }

        // temp file + rename keeps readers from observing a partial blob
        let temp_path = full_path.with_extension("tmp");
        if let Err(e) = Self::commit(&temp_path, &full_path, path, data).await {
            for leftover in [&temp_path, &full_path] {
                if let Err(cleanup) = fs::remove_file(leftover).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            { SUBSYSTEM } = "storage",
                            { COMPONENT } = "filesystem",
                            { STORAGE_PATH } = %leftover.display(),
                            { ERROR_MSG } = %cleanup,
                            "Could not remove partial write"
                        );
                    }
                }
            }
            return Err(e);
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        match fs::read(full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Stored file {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("remove {}: {}", path, e))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}

/// Storage locator for a record id.
///
/// Example: `files/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.bin`
pub fn generate_storage_path(id: &Uuid) -> String {
    let hex = id.simple().to_string();
    format!("files/{}/{}/{}.bin", &hex[0..2], &hex[2..4], id.as_hyphenated())
}
