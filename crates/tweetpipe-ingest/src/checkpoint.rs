//! Checkpoint resolution
//!
//! A run never records its own progress; the destination table is the
//! checkpoint. Resolution happens exactly once, before any candidate is
//! read, and the result is immutable for the rest of the run. Re-running
//! after an interruption therefore needs no sidecar state files.

use crate::error::{PipelineError, Result};
use sqlx::PgPool;
use tracing::{info, warn};

/// How the resume position is derived from an existing destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStrategy {
    /// Committed row count; candidate positions are contiguous 1-based
    /// line numbers, so the count equals the last committed position.
    RowCount,
    /// Highest stored tweet_id; candidate positions are sparse but
    /// monotonically increasing identifiers.
    MaxTweetId,
}

/// Immutable resume state for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// True when the destination already holds committed work
    pub resuming: bool,
    /// Position of the last durably committed candidate; 0 when fresh
    pub position: i64,
}

impl Checkpoint {
    /// Fresh-start checkpoint for an empty or just-created destination
    pub fn fresh() -> Self {
        Self {
            resuming: false,
            position: 0,
        }
    }

    /// Checkpoint for a probed resume position
    ///
    /// An existing destination with no committed work (count or max of 0)
    /// is a fresh start, not a resume.
    pub fn from_position(position: i64) -> Self {
        if position == 0 {
            return Self::fresh();
        }
        Self {
            resuming: true,
            position,
        }
    }
}

/// Create the destination if needed and derive the checkpoint from it
///
/// `ddl` is executed as-is. SQLSTATE 42P07 (duplicate_table) selects the
/// resume probe; any other failure is a setup error. A destination that
/// exists but holds no rows is still a fresh start.
pub async fn resolve(
    pool: &PgPool,
    table: &str,
    ddl: &str,
    strategy: ResumeStrategy,
) -> Result<Checkpoint> {
    let prepare_err = |source| PipelineError::Prepare {
        table: table.to_string(),
        source,
    };

    match sqlx::query(ddl).execute(pool).await {
        Ok(_) => {
            info!(table = %table, "Created destination table");
            return Ok(Checkpoint::fresh());
        }
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("42P07") => {
            warn!(table = %table, "Destination table already exists, probing for committed work");
        }
        Err(e) => return Err(prepare_err(e)),
    }

    let sql = probe_sql(strategy, table);
    let position = sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool)
        .await
        .map_err(prepare_err)?;

    let checkpoint = Checkpoint::from_position(position);
    if checkpoint.resuming {
        warn!(table = %table, position, "Resuming past committed work");
    }
    Ok(checkpoint)
}

fn probe_sql(strategy: ResumeStrategy, table: &str) -> String {
    match strategy {
        ResumeStrategy::RowCount => format!(r#"SELECT count(*) FROM "{table}""#),
        ResumeStrategy::MaxTweetId => {
            format!(r#"SELECT coalesce(max(tweet_id), 0) FROM "{table}""#)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_checkpoint() {
        let cp = Checkpoint::fresh();
        assert!(!cp.resuming);
        assert_eq!(cp.position, 0);
    }

    #[test]
    fn test_empty_destination_resolves_fresh() {
        assert_eq!(Checkpoint::from_position(0), Checkpoint::fresh());
    }

    #[test]
    fn test_committed_work_resolves_to_resume() {
        let cp = Checkpoint::from_position(1472);
        assert!(cp.resuming);
        assert_eq!(cp.position, 1472);
    }

    #[test]
    fn test_row_count_probe() {
        let sql = probe_sql(ResumeStrategy::RowCount, "tweets");
        assert_eq!(sql, r#"SELECT count(*) FROM "tweets""#);
    }

    #[test]
    fn test_max_id_probe_handles_empty_table() {
        let sql = probe_sql(ResumeStrategy::MaxTweetId, "titles_tweets");
        assert!(sql.contains("coalesce(max(tweet_id), 0)"));
    }
}
