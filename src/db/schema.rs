use tracing::{debug, instrument};

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    /// Creates the read-model tables the reporting pipeline queries. The
    /// daily tables are maintained by the external ingestion path; rankings
    /// reference the item tables by id.
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        debug!(target: TARGET_DB, "Initializing schema");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS article_counts_daily (
                published_at TEXT NOT NULL,
                article_source TEXT NOT NULL,
                article_category TEXT NOT NULL,
                article_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE (published_at, article_source, article_category)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS article_signals_daily (
                published_at TEXT NOT NULL,
                article_source TEXT NOT NULL,
                article_category TEXT NOT NULL,
                signal_source TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                value REAL NOT NULL DEFAULT 0,
                UNIQUE (published_at, article_source, article_category, signal_source, signal_type)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS article_rankings (
                published_at TEXT NOT NULL,
                article_source TEXT NOT NULL,
                article_category TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                signal_type TEXT NOT NULL,
                signal_value REAL NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                headline TEXT,
                image_url TEXT,
                snippet TEXT,
                published_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS article_sources (
                id INTEGER PRIMARY KEY,
                hostname TEXT NOT NULL UNIQUE,
                name TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS article_top_words_daily (
                published_at TEXT NOT NULL,
                article_source TEXT NOT NULL,
                article_category TEXT NOT NULL,
                word TEXT NOT NULL,
                word_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE (published_at, article_source, article_category, word)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS article_document_frequencies (
                term TEXT PRIMARY KEY,
                df INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tweet_counts_daily (
                published_at TEXT NOT NULL,
                tweet_type TEXT NOT NULL,
                tweet_category TEXT NOT NULL,
                tweet_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE (published_at, tweet_type, tweet_category)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tweet_signals_daily (
                published_at TEXT NOT NULL,
                tweet_type TEXT NOT NULL,
                tweet_category TEXT NOT NULL,
                signal_source TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                value REAL NOT NULL DEFAULT 0,
                UNIQUE (published_at, tweet_type, tweet_category, signal_source, signal_type)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tweet_rankings (
                published_at TEXT NOT NULL,
                tweet_type TEXT NOT NULL,
                tweet_category TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                signal_type TEXT NOT NULL,
                signal_value REAL NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tweets (
                id INTEGER PRIMARY KEY,
                text TEXT,
                published_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS page_signals (
                url_id TEXT NOT NULL,
                signal_source TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                value REAL NOT NULL DEFAULT 0,
                UNIQUE (url_id, signal_source, signal_type)
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_article_counts_published
                ON article_counts_daily (published_at)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_article_signals_published
                ON article_signals_daily (published_at)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_article_rankings_published
                ON article_rankings (published_at, signal_type)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_tweet_counts_published
                ON tweet_counts_daily (published_at)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_tweet_signals_published
                ON tweet_signals_daily (published_at)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_tweet_rankings_published
                ON tweet_rankings (published_at, signal_type)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_top_words_published
                ON article_top_words_daily (published_at)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(self.pool()).await?;
        }

        debug!(target: TARGET_DB, "Schema initialized");
        Ok(())
    }
}
