//! Tweetpipe Ingestion Library
//!
//! Resumable, checkpointed batch pipeline with two stages:
//!
//! - **load**: stream a newline-delimited tweet archive into PostgreSQL
//! - **titles**: fetch every stored tweet's URLs and store the page titles
//!
//! Interrupting either stage is safe. On the next run the destination
//! table itself supplies the checkpoint, committed work is counted and
//! skipped, and idempotent inserts absorb any replay of the batch that
//! was open when the run died.
//!
//! The moving parts: [`checkpoint`] resolves where to resume, [`source`]
//! yields candidates in stable order, [`runner`] drives them through a
//! stage, [`sink`] batches the writes, and [`progress`] keeps the
//! operator informed.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod load;
pub mod models;
pub mod progress;
pub mod runner;
pub mod sink;
pub mod source;
pub mod titles;

// Re-export commonly used types
pub use error::{PipelineError, Result, SkipReason};
