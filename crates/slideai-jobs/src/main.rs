//! `slideai-sweeper`: standalone expired-file reclamation.
//!
//! Connects to PostgreSQL, applies migrations, validates the storage root and
//! then either sweeps on an interval until interrupted or, with
//! `SWEEP_WORKER_ENABLED=false`, performs a single pass and exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slideai_core::{ResourceConfig, SystemClock};
use slideai_db::{
    log_pool_metrics, Database, FilesystemBackend, PgFileRecordRepository, PoolConfig,
};
use slideai_jobs::{SweepConfig, SweepWorker, Sweeper, WorkerConfig, WorkerEvent};

/// Subscriber settings read from the environment.
///
/// `LOG_FORMAT` is `json` or `text`, `LOG_FILE` switches output to a daily
/// rolling file, `LOG_ANSI` forces colors on or off and `RUST_LOG` is the
/// usual filter.
struct LogSettings {
    json: bool,
    file: Option<PathBuf>,
    ansi: Option<bool>,
}

impl LogSettings {
    const DEFAULT_FILTER: &'static str = "slideai_jobs=info,slideai_db=info";
    const DEFAULT_FILE_NAME: &'static str = "slideai-sweeper.log";

    fn from_env() -> Self {
        Self {
            json: std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
            file: std::env::var_os("LOG_FILE").map(PathBuf::from),
            ansi: std::env::var("LOG_ANSI")
                .ok()
                .map(|v| v == "true" || v == "1"),
        }
    }

    /// Install the global subscriber. The returned guard flushes the file
    /// writer and must outlive the program's logging.
    fn install(&self) -> Option<WorkerGuard> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| Self::DEFAULT_FILTER.into());
        let registry = tracing_subscriber::registry().with(env_filter);

        let Some(path) = &self.file else {
            if self.json {
                registry.with(tracing_subscriber::fmt::layer().json()).init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = self.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            return None;
        };

        let dir = path.parent().unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(Self::DEFAULT_FILE_NAME);
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));

        if self.json {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(self.ansi.unwrap_or(false)),
                )
                .init();
        }
        Some(guard)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_env();
    let _log_guard = log_settings.install();

    let resource_config = ResourceConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/slideai".to_string());

    info!(
        json_logs = log_settings.json,
        storage_root = %resource_config.file_storage_path,
        batch_limit = resource_config.sweep_batch_limit,
        keep_on_storage_failure = resource_config.sweep_keep_on_storage_failure,
        "Starting slideai-sweeper"
    );

    let db = Database::connect_with_config(&database_url, PoolConfig::from_env())
        .await
        .context("connecting to database")?;
    db.migrate().await.context("applying migrations")?;
    log_pool_metrics(db.pool());

    let storage = FilesystemBackend::new(&resource_config.file_storage_path);
    storage
        .validate()
        .await
        .map_err(|e| anyhow::anyhow!("storage root is not usable: {}", e))?;

    let sweeper = Arc::new(Sweeper::new(
        Arc::new(PgFileRecordRepository::new(db.pool.clone())),
        Arc::new(storage),
        Arc::new(SystemClock::new()),
        SweepConfig::from(&resource_config),
    ));

    if !worker_config.enabled {
        let report = sweeper.run_once().await?;
        info!(
            processed = report.processed,
            storage_failures = report.storage_failures,
            "Single sweep finished"
        );
        return Ok(());
    }

    let handle = SweepWorker::new(sweeper, worker_config).start();
    let mut events = handle.events();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");
    handle.shutdown().await?;

    // Let an in-flight sweep finish before the runtime is dropped.
    loop {
        match events.recv().await {
            Ok(WorkerEvent::WorkerStopped) | Err(RecvError::Closed) => break,
            _ => {}
        }
    }
    log_pool_metrics(db.pool());

    Ok(())
}
