//! Candidate sources
//!
//! Stage one reads `stream_<table>.json`, a newline-delimited archive in
//! which records are separated by blank lines. Stage two pages stored
//! tweets back out of the load destination in `tweet_id` order. Both
//! sources yield candidates in a stable order so checkpoint positions
//! mean the same thing on every run.

use crate::error::{PipelineError, Result};
use crate::runner::Candidate;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::warn;

/// Path of the stream file feeding a destination table
pub fn stream_path(data_dir: &Path, table: &str) -> PathBuf {
    data_dir.join(format!("stream_{table}.json"))
}

/// Totals gathered by the pre-scan of a stream file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub lines: u64,
    pub blank_lines: u64,
}

impl StreamStats {
    /// Number of candidate records (non-blank lines)
    pub fn records(&self) -> u64 {
        self.lines - self.blank_lines
    }

    /// Historical estimate assuming one blank separator per record
    pub fn separator_estimate(&self) -> u64 {
        self.lines / 2
    }
}

/// Count lines and blanks in one pass before the run starts
///
/// The exact non-blank count becomes the progress denominator. The old
/// halve-the-line-count estimate is still computed, and a mismatch is
/// logged, because it reveals archives with missing or doubled separators.
pub async fn scan_stream(path: &Path) -> Result<StreamStats> {
    let stream_err = |source| PipelineError::Stream {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(stream_err)?;
    let mut lines = BufReader::new(file).lines();

    let mut stats = StreamStats {
        lines: 0,
        blank_lines: 0,
    };
    while let Some(line) = lines.next_line().await.map_err(stream_err)? {
        stats.lines += 1;
        if line.is_empty() {
            stats.blank_lines += 1;
        }
    }

    if stats.records() != stats.separator_estimate() {
        warn!(
            records = stats.records(),
            estimate = stats.separator_estimate(),
            "Stream layout differs from one-separator-per-record; trusting the exact count"
        );
    }

    Ok(stats)
}

/// One candidate line from the stream file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    /// 1-based index among non-blank lines
    pub position: i64,
    /// Raw line, newline stripped
    pub line: String,
}

impl Candidate for StreamLine {
    fn position(&self) -> i64 {
        self.position
    }

    fn audit(&self) -> String {
        self.line.clone()
    }
}

/// Sequential reader over the non-blank lines of a stream file
pub struct StreamSource {
    lines: Lines<BufReader<File>>,
    path: PathBuf,
    position: i64,
}

impl StreamSource {
    /// Open the stream for candidate iteration
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await.map_err(|source| PipelineError::Stream {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            lines: BufReader::new(file).lines(),
            path: path.to_path_buf(),
            position: 0,
        })
    }

    /// Next candidate, or `None` at end of stream
    ///
    /// Blank separator lines are consumed silently; they never receive a
    /// position.
    pub async fn next(&mut self) -> Result<Option<StreamLine>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|source| PipelineError::Stream {
                    path: self.path.clone(),
                    source,
                })?;

            match line {
                None => return Ok(None),
                Some(l) if l.is_empty() => continue,
                Some(l) => {
                    self.position += 1;
                    return Ok(Some(StreamLine {
                        position: self.position,
                        line: l,
                    }));
                }
            }
        }
    }
}

/// One enrichment candidate: a stored tweet and its expanded URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRow {
    pub tweet_id: i64,
    pub urls: Vec<String>,
}

impl Candidate for UrlRow {
    fn position(&self) -> i64 {
        self.tweet_id
    }

    fn audit(&self) -> String {
        self.urls.join(" ")
    }
}

/// Total number of enrichment candidates in the source table
pub async fn count_source_rows(pool: &PgPool, table: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(&format!(r#"SELECT count(*) FROM "{table}""#))
        .fetch_one(pool)
        .await
        .map_err(PipelineError::Source)
}

/// Fetch the next page of `(tweet_id, urls)` past `after`, in id order
///
/// Keyset pagination: the caller advances `after` to the last id of the
/// previous page, so a page never re-reads rows and never skips any.
pub async fn fetch_url_page(
    pool: &PgPool,
    table: &str,
    after: i64,
    limit: i64,
) -> Result<Vec<UrlRow>> {
    let sql = format!(
        r#"SELECT tweet_id, urls FROM "{table}" WHERE tweet_id > $1 ORDER BY tweet_id ASC LIMIT $2"#
    );

    let rows = sqlx::query_as::<_, (i64, Option<Vec<String>>)>(&sql)
        .bind(after)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(PipelineError::Source)?;

    Ok(rows
        .into_iter()
        .map(|(tweet_id, urls)| UrlRow {
            tweet_id,
            urls: urls.unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_stream(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_stream_path_naming() {
        let p = stream_path(Path::new("./data"), "tweets");
        assert_eq!(p, PathBuf::from("./data/stream_tweets.json"));
    }

    #[tokio::test]
    async fn test_scan_counts_blank_separators() {
        let f = write_stream("{\"id\":1}\n\n{\"id\":2}\n\n");
        let stats = scan_stream(f.path()).await.unwrap();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.blank_lines, 2);
        assert_eq!(stats.records(), 2);
        assert_eq!(stats.separator_estimate(), 2);
    }

    #[tokio::test]
    async fn test_scan_without_separators() {
        let f = write_stream("a\nb\nc\n");
        let stats = scan_stream(f.path()).await.unwrap();
        assert_eq!(stats.records(), 3);
        assert_eq!(stats.separator_estimate(), 1);
    }

    #[tokio::test]
    async fn test_scan_empty_file() {
        let f = write_stream("");
        let stats = scan_stream(f.path()).await.unwrap();
        assert_eq!(stats.lines, 0);
        assert_eq!(stats.records(), 0);
    }

    #[tokio::test]
    async fn test_scan_missing_file_is_setup_error() {
        let err = scan_stream(Path::new("/nonexistent/stream_x.json"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_positions_count_only_candidates() {
        let f = write_stream("one\n\ntwo\n\nthree\n");
        let mut source = StreamSource::open(f.path()).await.unwrap();

        let first = source.next().await.unwrap().unwrap();
        assert_eq!((first.position, first.line.as_str()), (1, "one"));

        let second = source.next().await.unwrap().unwrap();
        assert_eq!((second.position, second.line.as_str()), (2, "two"));

        let third = source.next().await.unwrap().unwrap();
        assert_eq!(third.position, 3);

        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_crlf_lines_are_stripped() {
        let f = write_stream("one\r\n\r\ntwo\r\n");
        let mut source = StreamSource::open(f.path()).await.unwrap();
        assert_eq!(source.next().await.unwrap().unwrap().line, "one");
        assert_eq!(source.next().await.unwrap().unwrap().line, "two");
        assert!(source.next().await.unwrap().is_none());
    }
}
