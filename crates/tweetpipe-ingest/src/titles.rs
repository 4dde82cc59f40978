//! Stage two: enrich stored tweets with page titles
//!
//! For every stored tweet this stage fetches each expanded URL and keeps
//! the first `<title>` fragment of the body. One bad URL does not sink the
//! tweet: failures leave a gap in the title list, and only a tweet whose
//! URLs all fail is skipped, classified by its first failure. HTTP status
//! is deliberately ignored; an error page's title is still a title.

use crate::checkpoint::{self, ResumeStrategy};
use crate::config::FetchConfig;
use crate::error::{PipelineError, Result, SkipReason};
use crate::models::{self, TitleRecord, MAX_TITLE_LEN};
use crate::progress::{ProgressReporter, RunCounters};
use crate::runner::{Runner, Stage};
use crate::sink::BatchSink;
use crate::source::{self, UrlRow};
use async_trait::async_trait;
use regex::Regex;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

/// Loose on purpose: the first `<title>` anywhere in the body, any case,
/// newlines allowed inside. Titles carrying attributes do not match.
const TITLE_PATTERN: &str = r"(?is)<title>(.*?)</title>";

/// Fetches pages and extracts their title fragments
pub struct TitleExtractor {
    client: reqwest::Client,
    pattern: Regex,
}

impl TitleExtractor {
    /// Extractor with the configured connect and total-operation timeouts
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| PipelineError::config(format!("Cannot build HTTP client: {e}")))?;

        let pattern = Regex::new(TITLE_PATTERN)
            .map_err(|e| PipelineError::config(format!("Invalid title pattern: {e}")))?;

        Ok(Self { client, pattern })
    }

    /// Titles for every URL that yields one, in source order
    pub async fn extract(
        &self,
        tweet_id: i64,
        urls: &[String],
    ) -> std::result::Result<Vec<String>, SkipReason> {
        if urls.is_empty() {
            return Err(SkipReason::EmptyUrls);
        }

        let mut titles = Vec::new();
        let mut first_failure = None;

        for url in urls {
            match self.fetch_title(url).await {
                Ok(title) => titles.push(title),
                Err(reason) => {
                    warn!(tweet_id, url = %url, reason = %reason, "URL yielded no title");
                    if first_failure.is_none() {
                        first_failure = Some(reason);
                    }
                }
            }
        }

        if titles.is_empty() {
            return Err(first_failure.unwrap_or(SkipReason::EmptyUrls));
        }

        Ok(titles)
    }

    async fn fetch_title(&self, url: &str) -> std::result::Result<String, SkipReason> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let body = response.text().await.map_err(|e| classify(url, e))?;

        let fragment = title_fragment(&self.pattern, &body).ok_or_else(|| {
            SkipReason::Extraction {
                url: url.to_string(),
            }
        })?;

        // The length gate runs on the raw fragment, before entity cleanup,
        // against the store's varchar(1000) bound.
        if fragment.chars().count() >= MAX_TITLE_LEN {
            return Err(SkipReason::Extraction {
                url: url.to_string(),
            });
        }

        Ok(clean_title(fragment))
    }
}

fn title_fragment<'a>(pattern: &Regex, body: &'a str) -> Option<&'a str> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode entities, flatten embedded newlines, trim the edges
fn clean_title(fragment: &str) -> String {
    html_escape::decode_html_entities(fragment)
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// Map a transport error onto the skip taxonomy
fn classify(url: &str, err: reqwest::Error) -> SkipReason {
    let url = url.to_string();
    if err.is_timeout() {
        SkipReason::Timeout { url }
    } else if err.is_decode() {
        SkipReason::Decoding { url }
    } else {
        SkipReason::Connection { url, source: err }
    }
}

/// Fetch titles for stored tweets and persist them
struct TitleStage {
    extractor: TitleExtractor,
    sink: BatchSink,
}

#[async_trait]
impl Stage for TitleStage {
    type Item = UrlRow;
    type Record = TitleRecord;

    async fn transform(&self, item: &UrlRow) -> std::result::Result<TitleRecord, SkipReason> {
        let titles = self.extractor.extract(item.tweet_id, &item.urls).await?;
        Ok(TitleRecord {
            tweet_id: item.tweet_id,
            titles,
        })
    }

    async fn persist(&mut self, record: TitleRecord) -> sqlx::Result<()> {
        self.sink.insert(&record).await
    }

    async fn commit(&mut self) -> sqlx::Result<()> {
        self.sink.commit().await
    }

    async fn rollback(&mut self) -> sqlx::Result<()> {
        self.sink.rollback().await
    }
}

/// Run the titles stage end to end
///
/// Pages the source table in tweet_id order; the page size doubles as the
/// commit cadence. The cursor starts at zero even on a resume, so rows a
/// previous run already enriched stream back through the controller and
/// keep the counters honest about the whole table.
pub async fn run(
    pool: &PgPool,
    table: &str,
    chunk: u64,
    fetch: &FetchConfig,
) -> Result<RunCounters> {
    let dest = models::titles_table(table);
    info!(source = %table, dest = %dest, "Enriching stored tweets with page titles");

    let total = source::count_source_rows(pool, table).await?;

    let checkpoint = checkpoint::resolve(
        pool,
        &dest,
        &models::title_table_ddl(&dest),
        ResumeStrategy::MaxTweetId,
    )
    .await?;

    let stage = TitleStage {
        extractor: TitleExtractor::new(fetch)?,
        sink: BatchSink::new(pool.clone(), models::title_insert_sql(&dest)),
    };
    let reporter = ProgressReporter::new(total as u64);
    let mut runner = Runner::new(stage, checkpoint, total as u64, chunk, reporter);

    let page_size = chunk.max(1) as i64;
    let mut cursor = 0_i64;
    loop {
        let page = source::fetch_url_page(pool, table, cursor, page_size).await?;
        if let Some(last) = page.last() {
            cursor = last.tweet_id;
        } else {
            break;
        }

        for row in page {
            runner.step(row).await?;
        }
    }

    runner.finish().await
}
