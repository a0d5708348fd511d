//! Structured logging schema and field name constants for SlideAI.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same field names in every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Something an operator must look at (sweep batch query failed) |
//! | WARN  | Recoverable issue (storage removal failed, quota denied) |
//! | INFO  | Lifecycle events (startup, shutdown), sweep completions |
//! | DEBUG | Decision points (cache hit/miss, quota decisions) |
//! | TRACE | Per-item iteration inside sweeps and evictions |

// Where the event came from

/// Crate-level area emitting the event.
/// Values: "db", "jobs", "service", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Part of the subsystem, one level down.
/// Examples: "identity_cache", "quota", "file_registry", "sweeper", "pool"
pub const COMPONENT: &str = "component";

/// Operation being performed.
/// Examples: "resolve", "check_and_reserve", "create", "sweep"
pub const OPERATION: &str = "op";

// What it is about

/// External identity id.
pub const USER_ID: &str = "user_id";

/// FileRecord UUID being operated on.
pub const FILE_ID: &str = "file_id";

/// Service type of the operation ("video_abstract", "ppt_to_video").
pub const SERVICE_TYPE: &str = "service_type";

/// Storage locator of a backing file.
pub const STORAGE_PATH: &str = "storage_path";

// Counts and timings

/// Elapsed time of the operation, in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records touched by a batch operation.
pub const RESULT_COUNT: &str = "result_count";

/// Size of an upload in bytes.
pub const SIZE_BYTES: &str = "size_bytes";

/// Usage events counted for the current day.
pub const USED_TODAY: &str = "used_today";

// Pool occupancy

/// Open connections, busy or idle.
pub const POOL_SIZE: &str = "pool_size";

/// Connections waiting in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// Outcome

/// Whether the operation went through.
pub const SUCCESS: &str = "success";

/// Display text of the error that stopped an operation.
pub const ERROR_MSG: &str = "error";
