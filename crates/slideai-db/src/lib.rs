//! # slideai-db
//!
//! Storage layer for the SlideAI resource manager.
//!
//! This crate provides:
//! - A tuned Postgres pool ([`PoolConfig`], [`PoolSnapshot`])
//! - PostgreSQL repositories for identities, usage events and file records
//! - Filesystem blob storage behind the [`StorageBackend`] trait
//! - In-memory implementations of every storage trait for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use slideai_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> slideai_db::Result<()> {
//!     let db = Database::connect("postgres://localhost/slideai").await?;
//!     let used = db.usage.count_in_window(42, start, end).await?;
//!     println!("used today: {}", used);
//!     Ok(())
//! }
//! ```
pub mod file_storage;
pub mod files;
pub mod identities;
pub mod memory;
pub mod pool;
pub mod usage;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use slideai_core::*;

pub use file_storage::{generate_storage_path, FilesystemBackend, StorageBackend};
pub use files::PgFileRecordRepository;
pub use identities::PgIdentityStore;
pub use memory::{
    MemoryFileRecordRepository, MemoryIdentityStore, MemoryStorageBackend, MemoryUsageRepository,
};
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, PoolConfig, PoolSnapshot,
};
pub use usage::PgUsageRepository;

/// One pool plus the three repositories built on it.
pub struct Database {
    /// Shared by every repository below.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Read-only view of the external users table.
    pub identities: PgIdentityStore,
    /// Usage event log.
    pub usage: PgUsageRepository,
    /// File records.
    pub files: PgFileRecordRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            identities: PgIdentityStore::new(pool.clone()),
            usage: PgUsageRepository::new(pool.clone()),
            files: PgFileRecordRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Apply the schema under `migrations/`.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
