//! Resource manager configuration.

use std::time::Duration;

use tracing::warn;

use crate::defaults;
use crate::models::ServiceType;

/// Limits and windows governing quotas, caching and file retention.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Operations per identity per UTC day.
    pub daily_usage_limit: i64,
    /// Serialize check-then-record per identity.
    pub quota_strict: bool,
    /// Validity of a cached identity (monotonic).
    pub identity_cache_ttl: Duration,
    /// Fixed lifetime of a stored file.
    pub retention: chrono::Duration,
    /// Look-ahead used for expiring-soon warnings.
    pub expiry_warning: chrono::Duration,
    pub max_video_upload_bytes: u64,
    pub max_pdf_upload_bytes: u64,
    /// Records per sweep pass.
    pub sweep_batch_limit: i64,
    /// Leave a record `completed` when its storage removal fails.
    pub sweep_keep_on_storage_failure: bool,
    /// Filesystem root for stored files.
    pub file_storage_path: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            daily_usage_limit: defaults::DAILY_USAGE_LIMIT,
            quota_strict: defaults::QUOTA_STRICT,
            identity_cache_ttl: Duration::from_secs(defaults::IDENTITY_CACHE_TTL_SECS),
            retention: chrono::Duration::days(defaults::FILE_RETENTION_DAYS),
            expiry_warning: chrono::Duration::hours(defaults::FILE_EXPIRY_WARNING_HOURS),
            max_video_upload_bytes: defaults::MAX_VIDEO_UPLOAD_BYTES,
            max_pdf_upload_bytes: defaults::MAX_PDF_UPLOAD_BYTES,
            sweep_batch_limit: defaults::SWEEP_BATCH_LIMIT,
            sweep_keep_on_storage_failure: defaults::SWEEP_KEEP_ON_STORAGE_FAILURE,
            file_storage_path: defaults::FILE_STORAGE_PATH.to_string(),
        }
    }
}

impl ResourceConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DAILY_USAGE_LIMIT` | `5` | Operations per identity per UTC day |
    /// | `QUOTA_STRICT` | `true` | Serialize quota check and usage write per identity |
    /// | `IDENTITY_CACHE_TTL_SECS` | `300` | Identity cache TTL |
    /// | `FILE_RETENTION_DAYS` | `3` | File lifetime |
    /// | `FILE_EXPIRY_WARNING_HOURS` | `24` | Expiring-soon look-ahead |
    /// | `MAX_VIDEO_UPLOAD_BYTES` | `26214400` | Video upload cap |
    /// | `MAX_PDF_UPLOAD_BYTES` | `20971520` | PDF upload cap |
    /// | `SWEEP_BATCH_LIMIT` | `10` | Records per sweep |
    /// | `SWEEP_KEEP_ON_STORAGE_FAILURE` | `false` | Retry failed removals on a later sweep |
    /// | `FILE_STORAGE_PATH` | `./user_files` | Storage root |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            daily_usage_limit: env_parse(defaults::ENV_DAILY_USAGE_LIMIT, base.daily_usage_limit)
                .max(0),
            quota_strict: env_flag(defaults::ENV_QUOTA_STRICT, base.quota_strict),
            identity_cache_ttl: Duration::from_secs(env_parse(
                defaults::ENV_IDENTITY_CACHE_TTL_SECS,
                defaults::IDENTITY_CACHE_TTL_SECS,
            )),
            retention: chrono::Duration::days(
                env_parse(
                    defaults::ENV_FILE_RETENTION_DAYS,
                    defaults::FILE_RETENTION_DAYS,
                )
                .max(1),
            ),
            expiry_warning: chrono::Duration::hours(
                env_parse(
                    defaults::ENV_FILE_EXPIRY_WARNING_HOURS,
                    defaults::FILE_EXPIRY_WARNING_HOURS,
                )
                .max(0),
            ),
            max_video_upload_bytes: env_parse(
                defaults::ENV_MAX_VIDEO_UPLOAD_BYTES,
                base.max_video_upload_bytes,
            ),
            max_pdf_upload_bytes: env_parse(
                defaults::ENV_MAX_PDF_UPLOAD_BYTES,
                base.max_pdf_upload_bytes,
            ),
            sweep_batch_limit: env_parse(defaults::ENV_SWEEP_BATCH_LIMIT, base.sweep_batch_limit)
                .max(1),
            sweep_keep_on_storage_failure: env_flag(
                defaults::ENV_SWEEP_KEEP_ON_STORAGE_FAILURE,
                base.sweep_keep_on_storage_failure,
            ),
            file_storage_path: std::env::var(defaults::ENV_FILE_STORAGE_PATH)
                .unwrap_or(base.file_storage_path),
        }
    }

    /// Upload size cap for a service.
    pub fn max_upload_bytes(&self, service: ServiceType) -> u64 {
        match service {
            ServiceType::VideoAbstract => self.max_video_upload_bytes,
            ServiceType::PptToVideo => self.max_pdf_upload_bytes,
        }
    }

    /// Retention window in whole days.
    pub fn retention_days(&self) -> i64 {
        self.retention.num_days()
    }

    pub fn with_daily_usage_limit(mut self, limit: i64) -> Self {
        self.daily_usage_limit = limit;
        self
    }

    pub fn with_quota_strict(mut self, strict: bool) -> Self {
        self.quota_strict = strict;
        self
    }

    pub fn with_identity_cache_ttl(mut self, ttl: Duration) -> Self {
        self.identity_cache_ttl = ttl;
        self
    }

    /// Set the file lifetime. Anything shorter than a day is raised to one
    /// day, the same floor `from_env` applies.
    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention.max(chrono::Duration::days(1));
        self
    }

    pub fn with_sweep_batch_limit(mut self, limit: i64) -> Self {
        self.sweep_batch_limit = limit;
        self
    }

    pub fn with_sweep_keep_on_storage_failure(mut self, keep: bool) -> Self {
        self.sweep_keep_on_storage_failure = keep;
        self
    }
}

/// Read `name` as a `T`, warning and falling back to `default` when the
/// value does not parse.
pub fn env_parse<T: std::str::FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, fallback = %default, "Unparsable config value");
            default
        }),
        Err(_) => default,
    }
}

/// Read `name` as a switch: anything but `false` or `0` turns it on.
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_limits() {
        let config = ResourceConfig::default();
        assert_eq!(config.daily_usage_limit, 5);
        assert_eq!(config.identity_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.retention_days(), 3);
        assert_eq!(config.expiry_warning, chrono::Duration::hours(24));
        assert_eq!(config.sweep_batch_limit, 10);
        assert!(!config.sweep_keep_on_storage_failure);
    }

    #[test]
    fn test_max_upload_per_service() {
        let config = ResourceConfig::default();
        assert_eq!(
            config.max_upload_bytes(ServiceType::VideoAbstract),
            25 * 1024 * 1024
        );
        assert_eq!(
            config.max_upload_bytes(ServiceType::PptToVideo),
            20 * 1024 * 1024
        );
    }

    #[test]
    fn test_builders() {
        let config = ResourceConfig::default()
            .with_daily_usage_limit(2)
            .with_quota_strict(false)
            .with_retention(chrono::Duration::days(7))
            .with_sweep_batch_limit(50);
        assert_eq!(config.daily_usage_limit, 2);
        assert!(!config.quota_strict);
        assert_eq!(config.retention_days(), 7);
        assert_eq!(config.sweep_batch_limit, 50);
    }

    #[test]
    fn test_retention_floor_is_one_day() {
        let config = ResourceConfig::default().with_retention(chrono::Duration::zero());
        assert_eq!(config.retention, chrono::Duration::days(1));
        let config = ResourceConfig::default().with_retention(chrono::Duration::days(-2));
        assert_eq!(config.retention_days(), 1);
        let config = ResourceConfig::default().with_retention(chrono::Duration::hours(36));
        assert_eq!(config.retention, chrono::Duration::hours(36));
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("SLIDEAI_TEST_GARBAGE_LIMIT", "five");
        assert_eq!(env_parse("SLIDEAI_TEST_GARBAGE_LIMIT", 5i64), 5);
        std::env::set_var("SLIDEAI_TEST_GARBAGE_LIMIT", " 8 ");
        assert_eq!(env_parse("SLIDEAI_TEST_GARBAGE_LIMIT", 5i64), 8);
        std::env::remove_var("SLIDEAI_TEST_GARBAGE_LIMIT");
    }

    #[test]
    fn test_env_flag() {
        std::env::set_var("SLIDEAI_TEST_FLAG", "0");
        assert!(!env_flag("SLIDEAI_TEST_FLAG", true));
        std::env::set_var("SLIDEAI_TEST_FLAG", "yes");
        assert!(env_flag("SLIDEAI_TEST_FLAG", false));
        std::env::remove_var("SLIDEAI_TEST_FLAG");
        assert!(env_flag("SLIDEAI_TEST_FLAG", true));
    }
}
