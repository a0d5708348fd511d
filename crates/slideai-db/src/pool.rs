//! Postgres connection pool shared by the repositories and the sweeper.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use slideai_core::config::env_parse;
use slideai_core::defaults;
use slideai_core::logging::{COMPONENT, DURATION_MS, OPERATION, POOL_IDLE, POOL_SIZE, SUBSYSTEM};
use slideai_core::{Error, Result};

/// Sizing and timeouts for the connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Connections older than this are recycled. `None` keeps them forever.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: defaults::DB_MIN_CONNECTIONS,
            acquire_timeout: Duration::from_secs(defaults::DB_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::DB_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(defaults::DB_MAX_LIFETIME_SECS)),
        }
    }
}

impl PoolConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DATABASE_MAX_CONNECTIONS` | `10` | Pool upper bound |
    /// | `DATABASE_ACQUIRE_TIMEOUT_SECS` | `30` | Wait for a free connection |
    pub fn from_env() -> Self {
        let base = Self::default();
        let max_connections =
            env_parse(defaults::ENV_DATABASE_MAX_CONNECTIONS, base.max_connections).max(1);
        let acquire_timeout = Duration::from_secs(env_parse(
            defaults::ENV_DATABASE_ACQUIRE_TIMEOUT_SECS,
            base.acquire_timeout.as_secs(),
        ));

        Self {
            max_connections,
            min_connections: base.min_connections.min(max_connections),
            acquire_timeout,
            ..base
        }
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self.min_connections = self.min_connections.min(n);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub size: u32,
    pub idle: usize,
}

impl PoolSnapshot {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
        }
    }

    /// Every open connection is checked out.
    pub fn is_saturated(&self) -> bool {
        self.size > 0 && self.idle == 0
    }
}

/// Connect with [`PoolConfig::default`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Connect with explicit sizing.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout);
    if let Some(lifetime) = config.max_lifetime {
        options = options.max_lifetime(lifetime);
    }

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    let snapshot = PoolSnapshot::of(&pool);
    info!(
        { SUBSYSTEM } = "database",
        { COMPONENT } = "pool",
        { OPERATION } = "connect",
        max_connections = config.max_connections,
        { POOL_SIZE } = snapshot.size,
        { POOL_IDLE } = snapshot.idle,
        { DURATION_MS } = start.elapsed().as_millis() as u64,
        "Connected to Postgres"
    );
    Ok(pool)
}

/// Log the pool's occupancy, warning when it is saturated.
pub fn log_pool_metrics(pool: &PgPool) -> PoolSnapshot {
    let snapshot = PoolSnapshot::of(pool);
    if snapshot.is_saturated() {
        warn!(
            { SUBSYSTEM } = "database",
            { COMPONENT } = "pool",
            { POOL_SIZE } = snapshot.size,
            "All pooled connections are in use"
        );
    } else {
        debug!(
            { SUBSYSTEM } = "database",
            { COMPONENT } = "pool",
            { POOL_SIZE } = snapshot.size,
            { POOL_IDLE } = snapshot.idle,
            "Pool occupancy"
        );
    }
    snapshot
}
