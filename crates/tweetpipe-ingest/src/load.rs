//! Stage one: load the tweet archive
//!
//! Each non-blank line of `stream_<table>.json` is one tweet in Twitter's
//! streaming-API shape. Decoding happens in two steps so the audit log can
//! tell a line that is not JSON from a line that is JSON of the wrong
//! shape: `serde_json` rejects the former, the fixed key paths below
//! reject the latter. Either way the line is skipped, logged in full, and
//! the run keeps going.

use crate::checkpoint::{self, ResumeStrategy};
use crate::error::{Result, SkipReason};
use crate::models::{self, TweetRecord};
use crate::progress::{ProgressReporter, RunCounters};
use crate::runner::{Runner, Stage};
use crate::sink::BatchSink;
use crate::source::{self, StreamLine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::path::Path;
use tracing::info;

/// Twitter's created_at layout, e.g. "Mon Sep 24 03:35:21 +0000 2012"
const TWITTER_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Decode one archive line into a storable record
///
/// Entity lists keep their element order. An element whose projected
/// value is null or missing is dropped from the list; URLs additionally
/// drop empty strings. A missing list, by contrast, fails the whole line.
pub fn parse_line(line: &str) -> std::result::Result<TweetRecord, SkipReason> {
    let value: Value = serde_json::from_str(line)?;

    let tweet_id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or(SkipReason::MissingField("id"))?;

    let user_id = value
        .pointer("/user/id")
        .and_then(Value::as_i64)
        .ok_or(SkipReason::MissingField("user.id"))?;

    let raw_text = value
        .get("text")
        .and_then(Value::as_str)
        .ok_or(SkipReason::MissingField("text"))?;
    let text = html_escape::decode_html_entities(raw_text).into_owned();

    let raw_created = value
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or(SkipReason::MissingField("created_at"))?;
    let created_at = parse_timestamp(raw_created)?;

    let entities = value
        .get("entities")
        .ok_or(SkipReason::MissingField("entities"))?;

    let hashtags = entity_array(entities, "hashtags", "entities.hashtags")?
        .iter()
        .filter_map(|h| h.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let urls = entity_array(entities, "urls", "entities.urls")?
        .iter()
        .filter_map(|u| u.get("expanded_url").and_then(Value::as_str))
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    let mentions = entity_array(entities, "user_mentions", "entities.user_mentions")?
        .iter()
        .filter_map(|m| m.get("id").and_then(Value::as_i64))
        .collect();

    Ok(TweetRecord {
        tweet_id,
        user_id,
        created_at,
        text,
        hashtags,
        urls,
        mentions,
    })
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, SkipReason> {
    DateTime::parse_from_str(raw, TWITTER_TIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SkipReason::BadTimestamp(raw.to_string()))
}

fn entity_array<'a>(
    entities: &'a Value,
    key: &str,
    name: &'static str,
) -> std::result::Result<&'a Vec<Value>, SkipReason> {
    entities
        .get(key)
        .and_then(Value::as_array)
        .ok_or(SkipReason::MissingField(name))
}

/// Archive lines into the destination table
struct LoadStage {
    sink: BatchSink,
}

#[async_trait]
impl Stage for LoadStage {
    type Item = StreamLine;
    type Record = TweetRecord;

    async fn transform(&self, item: &StreamLine) -> std::result::Result<TweetRecord, SkipReason> {
        parse_line(&item.line)
    }

    async fn persist(&mut self, record: TweetRecord) -> sqlx::Result<()> {
        self.sink.insert(&record).await
    }

    async fn commit(&mut self) -> sqlx::Result<()> {
        self.sink.commit().await
    }

    async fn rollback(&mut self) -> sqlx::Result<()> {
        self.sink.rollback().await
    }
}

/// Run the load stage end to end
///
/// Pre-scans the stream for the progress denominator, resolves the
/// checkpoint from the destination's row count, then drives every
/// non-blank line through the controller with `batch_size` candidates per
/// commit.
pub async fn run(
    pool: &PgPool,
    table: &str,
    data_dir: &Path,
    batch_size: u64,
) -> Result<RunCounters> {
    let path = source::stream_path(data_dir, table);
    info!(table = %table, path = %path.display(), "Loading stream archive");

    let stats = source::scan_stream(&path).await?;
    info!(
        records = stats.records(),
        lines = stats.lines,
        "Pre-scan complete"
    );

    let checkpoint = checkpoint::resolve(
        pool,
        table,
        &models::tweet_table_ddl(table),
        ResumeStrategy::RowCount,
    )
    .await?;

    let stage = LoadStage {
        sink: BatchSink::new(pool.clone(), models::tweet_insert_sql(table)),
    };
    let reporter = ProgressReporter::new(stats.records());
    let mut runner = Runner::new(stage, checkpoint, stats.records(), batch_size, reporter);

    let mut lines = source::StreamSource::open(&path).await?;
    while let Some(item) = lines.next().await? {
        runner.step(item).await?;
    }

    runner.finish().await
}
