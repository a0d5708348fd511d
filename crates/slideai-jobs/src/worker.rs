//! Periodic sweep worker.
//!
//! Runs [`Sweeper::run_once`] on a fixed interval alongside the opportunistic
//! sweeps triggered by health probes. Both paths are safe to overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{error, info};

use slideai_core::config::{env_flag, env_parse};
use slideai_core::defaults;
use slideai_core::logging::{COMPONENT, ERROR_MSG, SUBSYSTEM};
use slideai_core::{Error, Result};

use crate::sweep::{SweepReport, Sweeper};

/// Capacity of the worker event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the sweep worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Whether to run periodic sweeps at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::SWEEP_INTERVAL_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEP_WORKER_ENABLED` | `true` | Enable/disable periodic sweeps |
    /// | `SWEEP_INTERVAL_SECS` | `300` | Seconds between sweeps |
    pub fn from_env() -> Self {
        Self {
            interval_secs: env_parse(
                defaults::ENV_SWEEP_INTERVAL_SECS,
                defaults::SWEEP_INTERVAL_SECS,
            )
            .max(1),
            enabled: env_flag(defaults::ENV_SWEEP_WORKER_ENABLED, true),
        }
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the sweep worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    WorkerStarted,
    SweepCompleted(SweepReport),
    SweepFailed { error: String },
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to stop after the sweep in progress, if any.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Background task sweeping on a fixed interval.
pub struct SweepWorker {
    sweeper: Arc<Sweeper>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl SweepWorker {
    pub fn new(sweeper: Arc<Sweeper>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sweeper,
            config,
            event_tx,
        }
    }

    /// Spawn the worker loop and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                { SUBSYSTEM } = "jobs",
                { COMPONENT } = "sweep_worker",
                "Sweep worker is disabled, not starting"
            );
            return;
        }

        info!(
            { SUBSYSTEM } = "jobs",
            { COMPONENT } = "sweep_worker",
            interval_secs = self.config.interval_secs,
            batch_limit = self.sweeper.config().batch_limit,
            "Sweep worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let interval = Duration::from_secs(self.config.interval_secs);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match self.sweeper.run_once().await {
                Ok(report) => {
                    let _ = self.event_tx.send(WorkerEvent::SweepCompleted(report));
                }
                Err(e) => {
                    error!(
                        { SUBSYSTEM } = "jobs",
                        { COMPONENT } = "sweep_worker",
                        { ERROR_MSG } = %e,
                        "Sweep failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::SweepFailed {
                        error: e.to_string(),
                    });
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(interval) => {}
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!(
            { SUBSYSTEM } = "jobs",
            { COMPONENT } = "sweep_worker",
            "Sweep worker stopped"
        );
    }
}
