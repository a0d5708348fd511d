//! # slideai-core
//!
//! Core types, traits, and abstractions for the SlideAI resource manager.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the storage, sweeper and service crates depend on.

pub mod clock;
pub mod config;
pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use clock::{Clock, DayWindow, ManualClock, SystemClock};
pub use config::ResourceConfig;
pub use error::{Error, Result};
pub use file_safety::{sanitize_filename, validate_upload, ValidationResult};
pub use models::*;
pub use traits::*;
