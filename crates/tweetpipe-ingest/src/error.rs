//! Error types for the tweetpipe pipeline
//!
//! Failures fall into two disjoint families. [`SkipReason`] classifies
//! per-record failures the run survives: the record is logged with its raw
//! payload, counted, and the run moves on. [`PipelineError`] classifies
//! failures that end the run, split into setup problems (nothing was
//! processed) and fatal persistence problems (prior batches stay committed).
//! The split keeps the process exit status mechanical.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Exit status for setup failures: configuration, connection, table
/// preparation, or the input stream. Nothing was processed.
pub const EXIT_SETUP: i32 = 1;

/// Exit status for fatal persistence failures mid-run. Batches committed
/// before the failure are durable; re-running resumes past them.
pub const EXIT_FATAL: i32 = 3;

/// Per-record failure that skips the record and lets the run continue
///
/// Never escapes the run controller; every variant is logged at WARN with
/// enough context to audit the record later.
#[derive(Error, Debug)]
pub enum SkipReason {
    /// Line is not valid JSON
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// JSON parsed but a required field is missing or has the wrong type
    #[error("missing or ill-typed field '{0}'")]
    MissingField(&'static str),

    /// created_at is not a Twitter-format timestamp
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),

    /// Enrichment candidate carries no URLs
    #[error("no URLs to fetch")]
    EmptyUrls,

    /// Fetch exceeded the configured deadline
    #[error("timed out fetching '{url}'")]
    Timeout { url: String },

    /// Connection-level fetch failure
    #[error("connection failed for '{url}': {source}")]
    Connection { url: String, source: reqwest::Error },

    /// Response body could not be decoded as text
    #[error("undecodable response body from '{url}'")]
    Decoding { url: String },

    /// Body fetched but it yielded no usable title
    #[error("no usable title in '{url}'")]
    Extraction { url: String },
}

/// Failure that ends the run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// Could not reach the database before any work started
    #[error("Database connection failed: {0}. Check DATABASE_URL and that PostgreSQL is accepting connections.")]
    Connect(#[source] sqlx::Error),

    /// Input stream file could not be opened or read
    #[error("Cannot read stream file {path:?}: {source}. Verify the data directory and table name.")]
    Stream {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Destination table could not be created or probed
    #[error("Failed to prepare table '{table}': {source}")]
    Prepare { table: String, source: sqlx::Error },

    /// Reading candidates from the store failed mid-run
    #[error("Source query failed: {0}")]
    Source(#[source] sqlx::Error),

    /// The store rejected a well-formed record
    #[error("Fatal write at position {position}: {source}. Batches committed before this point are preserved; re-run to resume.")]
    Fatal { position: i64, source: sqlx::Error },

    /// A batch-boundary commit failed
    #[error("Batch commit failed: {0}")]
    Commit(#[source] sqlx::Error),
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Process exit status for this error class
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_)
            | PipelineError::Connect(_)
            | PipelineError::Stream { .. }
            | PipelineError::Prepare { .. }
            | PipelineError::Source(_) => EXIT_SETUP,
            PipelineError::Fatal { .. } | PipelineError::Commit(_) => EXIT_FATAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_exit_with_1() {
        assert_eq!(PipelineError::config("missing DATABASE_URL").exit_code(), 1);
        assert_eq!(
            PipelineError::Stream {
                path: PathBuf::from("./data/stream_tweets.json"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }
            .exit_code(),
            1
        );
        assert_eq!(
            PipelineError::Source(sqlx::Error::PoolTimedOut).exit_code(),
            1
        );
    }

    #[test]
    fn test_fatal_errors_exit_with_3() {
        assert_eq!(
            PipelineError::Fatal {
                position: 42,
                source: sqlx::Error::PoolTimedOut,
            }
            .exit_code(),
            3
        );
        assert_eq!(
            PipelineError::Commit(sqlx::Error::PoolTimedOut).exit_code(),
            3
        );
    }

    #[test]
    fn test_fatal_message_names_position() {
        let err = PipelineError::Fatal {
            position: 1001,
            source: sqlx::Error::PoolTimedOut,
        };
        assert!(err.to_string().contains("position 1001"));
    }
}
