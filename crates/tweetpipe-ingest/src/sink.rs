//! Batched persistence
//!
//! Writes go through one transaction at a time: the first insert after a
//! commit opens a fresh transaction, and the run controller decides when
//! to commit. `INSERT ... ON CONFLICT DO NOTHING` makes candidates that
//! replay after a resume harmless, so a batch boundary is the only
//! durability boundary that matters.

use crate::models::BindRecord;
use sqlx::{PgPool, Postgres, Transaction};

/// Transactional writer for one destination table
pub struct BatchSink {
    pool: PgPool,
    insert_sql: String,
    tx: Option<Transaction<'static, Postgres>>,
}

impl BatchSink {
    /// Sink writing through `insert_sql` (one of the [`crate::models`] builders)
    pub fn new(pool: PgPool, insert_sql: String) -> Self {
        Self {
            pool,
            insert_sql,
            tx: None,
        }
    }

    /// Insert one record inside the current batch transaction
    ///
    /// The transaction opens lazily, so a run that resume-skips every
    /// candidate never writes at all.
    pub async fn insert<R: BindRecord>(&mut self, record: &R) -> sqlx::Result<()> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await?);
        }

        if let Some(tx) = self.tx.as_mut() {
            let query = sqlx::query(&self.insert_sql);
            record.bind(query).execute(&mut **tx).await?;
        }

        Ok(())
    }

    /// Commit the open batch; a no-op when nothing was inserted
    pub async fn commit(&mut self) -> sqlx::Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    /// Drop the open batch without committing
    pub async fn rollback(&mut self) -> sqlx::Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    /// True while a transaction holds uncommitted inserts
    #[cfg(test)]
    fn has_open_batch(&self) -> bool {
        self.tx.is_some()
    }
}
