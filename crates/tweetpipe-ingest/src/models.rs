//! Record shapes and the SQL that stores them
//!
//! Table names come from operator input, so every statement builder splices
//! an already-validated identifier (see [`crate::config::validate_table_name`])
//! and quotes it. Values always travel as bind parameters.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// Store-side bound on a single title (`varchar(1000)`). Fragments at or
/// past this length are rejected during extraction, before entity cleanup.
pub const MAX_TITLE_LEN: usize = 1000;

/// One tweet, shaped for the destination table
#[derive(Debug, Clone, PartialEq)]
pub struct TweetRecord {
    pub tweet_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub hashtags: Vec<String>,
    pub urls: Vec<String>,
    pub mentions: Vec<i64>,
}

/// Extracted page titles for one tweet, in source URL order
#[derive(Debug, Clone, PartialEq)]
pub struct TitleRecord {
    pub tweet_id: i64,
    pub titles: Vec<String>,
}

/// Binds a record's columns onto its prepared INSERT
///
/// Lets one sink serve both stages; the statement text and the bind order
/// are defined together in this module so they cannot drift apart.
pub trait BindRecord {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments>;
}

impl BindRecord for TweetRecord {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.tweet_id)
            .bind(self.user_id)
            .bind(self.created_at)
            .bind(&self.text)
            .bind(&self.hashtags)
            .bind(&self.urls)
            .bind(&self.mentions)
    }
}

impl BindRecord for TitleRecord {
    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query.bind(self.tweet_id).bind(&self.titles)
    }
}

/// Name of the enrichment destination for a given source table
pub fn titles_table(table: &str) -> String {
    format!("titles_{table}")
}

/// CREATE TABLE statement for the load destination
///
/// The varchar bounds are the enforcement point for oversized values: a
/// record that exceeds them is rejected by the store, not truncated here.
pub fn tweet_table_ddl(table: &str) -> String {
    format!(
        r#"CREATE TABLE "{table}" (
    tweet_id bigint NOT NULL,
    user_id bigint,
    created_at timestamptz,
    tweet_text varchar(1000),
    hashtags varchar(400)[],
    urls varchar(4000)[],
    user_mentions bigint[],
    CONSTRAINT "{table}_pkey" PRIMARY KEY (tweet_id)
)"#
    )
}

/// CREATE TABLE statement for the enrichment destination
pub fn title_table_ddl(table: &str) -> String {
    format!(
        r#"CREATE TABLE "{table}" (
    tweet_id bigint NOT NULL,
    titles varchar(1000)[],
    CONSTRAINT "{table}_pkey" PRIMARY KEY (tweet_id)
)"#
    )
}

/// Idempotent INSERT for the load destination
pub fn tweet_insert_sql(table: &str) -> String {
    format!(
        r#"INSERT INTO "{table}" (tweet_id, user_id, created_at, tweet_text, hashtags, urls, user_mentions) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (tweet_id) DO NOTHING"#
    )
}

/// Idempotent INSERT for the enrichment destination
pub fn title_insert_sql(table: &str) -> String {
    format!(
        r#"INSERT INTO "{table}" (tweet_id, titles) VALUES ($1, $2) ON CONFLICT (tweet_id) DO NOTHING"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_table_name() {
        assert_eq!(titles_table("tweets"), "titles_tweets");
    }

    #[test]
    fn test_inserts_are_idempotent() {
        assert!(tweet_insert_sql("tweets").contains("ON CONFLICT (tweet_id) DO NOTHING"));
        assert!(title_insert_sql("titles_tweets").contains("ON CONFLICT (tweet_id) DO NOTHING"));
    }

    #[test]
    fn test_ddl_declares_primary_key() {
        let ddl = tweet_table_ddl("tweets");
        assert!(ddl.contains(r#"CREATE TABLE "tweets""#));
        assert!(ddl.contains("PRIMARY KEY (tweet_id)"));

        let ddl = title_table_ddl("titles_tweets");
        assert!(ddl.contains("titles varchar(1000)[]"));
        assert!(ddl.contains("PRIMARY KEY (tweet_id)"));
    }

    #[test]
    fn test_insert_binds_every_column() {
        let sql = tweet_insert_sql("tweets");
        for placeholder in ["$1", "$2", "$3", "$4", "$5", "$6", "$7"] {
            assert!(sql.contains(placeholder));
        }
        assert!(!sql.contains("$8"));
    }
}
