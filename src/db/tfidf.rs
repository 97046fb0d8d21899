use rand::Rng;
use sqlx::Row;
use tracing::{debug, error, instrument};

use super::core::Database;
use super::metrics::render_filters;
use crate::dates::DateRange;
use crate::errors::ApiError;
use crate::query::DimensionFilter;
use crate::tfidf::{normalize_frequencies, score_and_rank, TopWord};
use crate::TARGET_DB;

impl Database {
    /// Aggregates raw per-term occurrence counts over the range.
    #[instrument(target = "db", level = "debug", skip(self, range, filters))]
    pub async fn term_frequencies(
        &self,
        range: &DateRange,
        filters: &[DimensionFilter],
    ) -> Result<Vec<(String, f64)>, sqlx::Error> {
        let (filter_sql, filter_binds) = render_filters(filters);
        let sql = format!(
            "SELECT word, CAST(SUM(word_count) AS REAL) AS tf \
             FROM article_top_words_daily \
             WHERE published_at BETWEEN ? AND ?{filter_sql} \
             GROUP BY word",
        );

        let mut query = sqlx::query(&sql).bind(range.start_param()).bind(range.end_param());
        for bind in &filter_binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(self.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("word"), row.get::<f64, _>("tf")))
            .collect())
    }

    pub async fn corpus_document_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(self.pool())
            .await
    }

    /// The full two-stage top-words pipeline: term frequencies over the
    /// range, frequency floor and normalization, then the document-frequency
    /// join through a request-unique scratch table. The scratch table is
    /// dropped on every exit path, including a failed join.
    pub async fn top_words(
        &self,
        range: &DateRange,
        filters: &[DimensionFilter],
        limit: usize,
    ) -> Result<Vec<TopWord>, ApiError> {
        let raw = self.term_frequencies(range, filters).await?;
        let normalized = normalize_frequencies(raw, range.day_count());
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let scratch = self.create_term_scratch().await?;
        let joined = self.join_document_frequencies(&scratch, &normalized).await;
        self.drop_term_scratch(&scratch).await;
        let joined = joined?;

        let corpus_size = self.corpus_document_count().await? as f64;
        Ok(score_and_rank(joined, corpus_size, limit))
    }

    async fn create_term_scratch(&self) -> Result<String, sqlx::Error> {
        let suffix: u32 = rand::rng().random_range(10_000..=99_999);
        let name = format!("term_frequencies_scratch_{}", suffix);

        debug!(target: TARGET_DB, "Creating scratch table {}", name);
        sqlx::query(&format!(
            "CREATE TABLE {} (term TEXT PRIMARY KEY, tf REAL NOT NULL DEFAULT 0)",
            name
        ))
        .execute(self.pool())
        .await?;

        Ok(name)
    }

    async fn join_document_frequencies(
        &self,
        scratch: &str,
        normalized: &[(String, f64)],
    ) -> Result<Vec<(String, f64, f64)>, sqlx::Error> {
        let insert_sql = format!(
            "INSERT INTO {} (term, tf) VALUES (?, ?) \
             ON CONFLICT(term) DO UPDATE SET tf = excluded.tf",
            scratch
        );
        for (term, tf) in normalized {
            sqlx::query(&insert_sql)
                .bind(term)
                .bind(tf)
                .execute(self.pool())
                .await?;
        }

        let join_sql = format!(
            "SELECT t.term, t.tf, CAST(df.df AS REAL) AS df \
             FROM {} t \
             JOIN article_document_frequencies df ON df.term = t.term",
            scratch
        );
        let rows = sqlx::query(&join_sql).fetch_all(self.pool()).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<String, _>("term"),
                    row.get::<f64, _>("tf"),
                    row.get::<f64, _>("df"),
                )
            })
            .collect())
    }

    /// Best-effort removal; a failed drop is logged rather than masking the
    /// pipeline's own result.
    async fn drop_term_scratch(&self, scratch: &str) {
        debug!(target: TARGET_DB, "Dropping scratch table {}", scratch);
        if let Err(err) = sqlx::query(&format!("DROP TABLE IF EXISTS {}", scratch))
            .execute(self.pool())
            .await
        {
            error!(target: TARGET_DB, "Failed to drop scratch table {}: {:?}", scratch, err);
        }
    }
}
