use serde::Serialize;
use tracing::instrument;

use super::core::Database;

/// Row counts of the main repositories, for the dashboard landing page.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStats {
    pub news_sources_count: i64,
    pub news_articles_count: i64,
    pub tweets_count: i64,
}

impl Database {
    #[instrument(target = "db", level = "debug", skip(self))]
    pub async fn repository_stats(&self) -> Result<RepositoryStats, sqlx::Error> {
        let news_sources_count = self.count_rows("article_sources").await?;
        let news_articles_count = self.count_rows("articles").await?;
        let tweets_count = self.count_rows("tweets").await?;

        Ok(RepositoryStats {
            news_sources_count,
            news_articles_count,
            tweets_count,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.pool())
            .await
    }
}
