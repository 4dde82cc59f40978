//! Tweetpipe Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared infrastructure for the tweetpipe workspace.
//!
//! # Overview
//!
//! This crate provides the logging layer used by every tweetpipe binary:
//!
//! - **Logging**: tracing-based structured logging with console/file targets,
//!   text or JSON formats, daily file rotation, and environment overrides
//!
//! # Example
//!
//! ```no_run
//! use tweetpipe_common::logging::{LogConfig, init_logging};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!
//!     info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod logging;

// Re-export commonly used types
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
