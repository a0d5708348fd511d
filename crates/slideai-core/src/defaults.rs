//! Centralized default constants for the SlideAI resource manager.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration loaders fall back to these when an environment variable is
//! unset or unparsable.

// =============================================================================
// QUOTA
// =============================================================================

/// Billable operations a non-privileged identity may perform per UTC day.
pub const DAILY_USAGE_LIMIT: i64 = 5;

/// Serialize check-then-record per identity.
pub const QUOTA_STRICT: bool = true;

// =============================================================================
// IDENTITY CACHE
// =============================================================================

/// Seconds a resolved identity stays valid in the cache.
pub const IDENTITY_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// FILE RETENTION
// =============================================================================

/// Days a stored file is retained before the sweeper reclaims it.
pub const FILE_RETENTION_DAYS: i64 = 3;

/// Hours before expiry at which a file is reported as expiring soon.
pub const FILE_EXPIRY_WARNING_HOURS: i64 = 24;

/// Maximum records returned by an expiring-soon query.
pub const EXPIRING_LIST_LIMIT: i64 = 50;

/// Maximum records returned when listing an identity's files.
pub const FILE_LIST_LIMIT: i64 = 100;

/// Default on-disk root for stored files.
pub const FILE_STORAGE_PATH: &str = "./user_files";

// =============================================================================
// UPLOAD LIMITS
// =============================================================================

/// Maximum accepted video upload size (25 MiB).
pub const MAX_VIDEO_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Maximum accepted PDF upload size (20 MiB).
pub const MAX_PDF_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

// =============================================================================
// SWEEPER
// =============================================================================

/// Records processed per sweep pass.
pub const SWEEP_BATCH_LIMIT: i64 = 10;

/// Interval between periodic sweeps when the worker is enabled.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Leave a record `completed` when its storage could not be removed.
pub const SWEEP_KEEP_ON_STORAGE_FAILURE: bool = false;

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Upper bound on pooled Postgres connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Connections kept open while idle.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Seconds to wait for a free connection before failing.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds an idle connection is kept.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Seconds before a connection is recycled.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

pub const ENV_DAILY_USAGE_LIMIT: &str = "DAILY_USAGE_LIMIT";
pub const ENV_QUOTA_STRICT: &str = "QUOTA_STRICT";
pub const ENV_IDENTITY_CACHE_TTL_SECS: &str = "IDENTITY_CACHE_TTL_SECS";
pub const ENV_FILE_RETENTION_DAYS: &str = "FILE_RETENTION_DAYS";
pub const ENV_FILE_EXPIRY_WARNING_HOURS: &str = "FILE_EXPIRY_WARNING_HOURS";
pub const ENV_FILE_STORAGE_PATH: &str = "FILE_STORAGE_PATH";
pub const ENV_MAX_VIDEO_UPLOAD_BYTES: &str = "MAX_VIDEO_UPLOAD_BYTES";
pub const ENV_MAX_PDF_UPLOAD_BYTES: &str = "MAX_PDF_UPLOAD_BYTES";
pub const ENV_SWEEP_BATCH_LIMIT: &str = "SWEEP_BATCH_LIMIT";
pub const ENV_SWEEP_KEEP_ON_STORAGE_FAILURE: &str = "SWEEP_KEEP_ON_STORAGE_FAILURE";
pub const ENV_SWEEP_WORKER_ENABLED: &str = "SWEEP_WORKER_ENABLED";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "SWEEP_INTERVAL_SECS";
pub const ENV_DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const ENV_DATABASE_ACQUIRE_TIMEOUT_SECS: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";
