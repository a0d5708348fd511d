//! # slideai-jobs
//!
//! Expired-file reclamation for the SlideAI resource manager.
//!
//! This crate provides:
//! - [`Sweeper`], a bounded-batch pass expiring files past their deadline
//! - [`SweepWorker`], an optional periodic driver with graceful shutdown
//!
//! ## Example
//!
//! ```ignore
//! use slideai_jobs::{SweepConfig, SweepWorker, Sweeper, WorkerConfig};
//!
//! let sweeper = Arc::new(Sweeper::new(files, storage, clock, SweepConfig::default()));
//! let report = sweeper.sweep(10).await?;
//!
//! let handle = SweepWorker::new(sweeper, WorkerConfig::from_env()).start();
//! handle.shutdown().await?;
//! ```

pub mod sweep;
pub mod worker;

// Re-export core types
pub use slideai_core::*;

pub use sweep::{SweepConfig, SweepReport, Sweeper};
pub use worker::{SweepWorker, WorkerConfig, WorkerEvent, WorkerHandle};
