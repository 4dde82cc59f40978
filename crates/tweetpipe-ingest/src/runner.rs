//! Run controller
//!
//! Drives one candidate at a time through resume-skip, transform, and
//! persist, and owns every counter and state transition along the way.
//! The controller is generic over a [`Stage`], so the load and titles
//! stages share one state machine and one set of invariants: candidates
//! are consumed in source order, a classified skip never stops the run,
//! and a fatal write ends it with prior batches intact.

use crate::checkpoint::Checkpoint;
use crate::error::{PipelineError, Result, SkipReason};
use crate::progress::{ProgressReporter, RunCounters};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Anything the controller can drive through a stage
pub trait Candidate {
    /// Monotonic position compared against the checkpoint
    fn position(&self) -> i64;

    /// Raw payload fragment for skip-audit logging
    fn audit(&self) -> String;
}

/// One pipeline stage: transform a candidate, persist the result
#[async_trait]
pub trait Stage {
    type Item: Candidate + Send + Sync;
    type Record: Send + Sync;

    /// Candidate to record, or a classified reason to drop it
    async fn transform(&self, item: &Self::Item) -> std::result::Result<Self::Record, SkipReason>;

    /// Write one record into the open batch
    async fn persist(&mut self, record: Self::Record) -> sqlx::Result<()>;

    /// Commit the open batch
    async fn commit(&mut self) -> sqlx::Result<()>;

    /// Drop the open batch after a fatal write
    async fn rollback(&mut self) -> sqlx::Result<()>;
}

/// Controller states over the life of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Counting past candidates a previous run already committed
    Resuming,
    /// Transforming and persisting new candidates
    Active,
    /// Source exhausted and final batch committed
    Done,
    /// Fatal persistence failure; no further candidates are read
    Aborted,
}

/// State machine driving candidates through a stage
pub struct Runner<S: Stage> {
    stage: S,
    state: RunState,
    checkpoint: Checkpoint,
    counters: RunCounters,
    reporter: ProgressReporter,
    commit_every: u64,
}

impl<S: Stage> Runner<S> {
    /// Controller for one run
    ///
    /// `commit_every` is clamped to at least 1; the cadence is measured on
    /// candidates seen, not on rows written.
    pub fn new(
        stage: S,
        checkpoint: Checkpoint,
        total: u64,
        commit_every: u64,
        reporter: ProgressReporter,
    ) -> Self {
        let state = if checkpoint.resuming {
            RunState::Resuming
        } else {
            RunState::Active
        };

        Self {
            stage,
            state,
            checkpoint,
            counters: RunCounters::with_total(total),
            reporter,
            commit_every: commit_every.max(1),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Feed one candidate through the machine
    ///
    /// An `Err` leaves the controller in [`RunState::Aborted`]; the caller
    /// must stop reading candidates.
    pub async fn step(&mut self, item: S::Item) -> Result<()> {
        debug_assert!(matches!(self.state, RunState::Resuming | RunState::Active));

        if self.state == RunState::Resuming {
            let position = item.position();

            if position <= self.checkpoint.position {
                // Committed by a previous run; count it without touching
                // the store. Commits stay suppressed in this region.
                self.counters.processed += 1;
                if position == self.checkpoint.position {
                    self.state = RunState::Active;
                }
                self.reporter.observe(&self.counters);
                return Ok(());
            }

            // Sparse positions can jump straight past the checkpoint; a
            // candidate beyond it was never committed and must run.
            self.state = RunState::Active;
        }

        self.process(item).await
    }

    /// Final commit after the source is exhausted
    pub async fn finish(mut self) -> Result<RunCounters> {
        self.commit_batch().await?;
        self.state = RunState::Done;

        info!(
            processed = self.counters.processed,
            skipped = self.counters.skipped,
            total = self.counters.total,
            "Run complete"
        );
        self.reporter.finish(&self.counters);

        Ok(self.counters)
    }

    async fn process(&mut self, item: S::Item) -> Result<()> {
        match self.stage.transform(&item).await {
            Ok(record) => match self.stage.persist(record).await {
                Ok(()) => self.counters.processed += 1,
                Err(source) => {
                    // The offending candidate counts as skipped so the
                    // abort summary adds up.
                    self.counters.skipped += 1;
                    return self.abort(item.position(), source).await;
                }
            },
            Err(reason) => {
                warn!(
                    position = item.position(),
                    reason = %reason,
                    raw = %item.audit(),
                    "Skipping candidate"
                );
                self.counters.skipped += 1;
            }
        }

        self.reporter.observe(&self.counters);

        if self.counters.seen() % self.commit_every == 0 {
            self.commit_batch().await?;
        }

        Ok(())
    }

    async fn commit_batch(&mut self) -> Result<()> {
        if let Err(source) = self.stage.commit().await {
            self.state = RunState::Aborted;
            let err = PipelineError::Commit(source);
            error!(
                error = %err,
                processed = self.counters.processed,
                skipped = self.counters.skipped,
                "Run aborted at batch commit"
            );
            self.reporter.abandon(&self.counters);
            return Err(err);
        }

        debug!(seen = self.counters.seen(), "Batch committed");
        Ok(())
    }

    async fn abort(&mut self, position: i64, source: sqlx::Error) -> Result<()> {
        self.state = RunState::Aborted;
        self.reporter.observe(&self.counters);

        if let Err(rollback_err) = self.stage.rollback().await {
            warn!(error = %rollback_err, "Rollback after fatal write failed");
        }

        let err = PipelineError::Fatal { position, source };
        error!(
            error = %err,
            processed = self.counters.processed,
            skipped = self.counters.skipped,
            "Run aborted"
        );
        self.reporter.abandon(&self.counters);

        Err(err)
    }
}
