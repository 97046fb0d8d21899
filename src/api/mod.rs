pub mod domain;
pub mod metrics;
pub mod news;
pub mod pages;
pub mod stats;
pub mod tweets;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::db::Database;
use crate::taxonomy::SignalTaxonomy;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub taxonomy: Arc<SignalTaxonomy>,
}

/// The query parameters shared by the reporting endpoints. Every list is a
/// comma-separated string; absent filters mean no restriction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date: Option<String>,
    pub days: Option<String>,
    pub limit: Option<String>,
    pub groups: Option<String>,
    pub article_sources: Option<String>,
    pub article_categories: Option<String>,
    pub tweet_types: Option<String>,
    pub tweet_categories: Option<String>,
    pub signal_sources: Option<String>,
    pub signal_types: Option<String>,
    pub signal_type: Option<String>,
    pub url_ids: Option<String>,
}

/// Splits a comma-separated parameter into its non-empty entries.
pub fn parse_list(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/stats/repository", get(stats::repository_stats))
        .route("/api/v1/newsarticles/count/daily", get(news::daily_counts))
        .route(
            "/api/v1/newsarticles/socialsignals/count/daily",
            get(news::daily_signal_counts),
        )
        .route(
            "/api/v1/newsarticles/socialsignals/trend",
            get(news::signal_trends),
        )
        .route(
            "/api/v1/newsarticles/socialsignals/top/daily",
            get(news::top_articles),
        )
        .route("/api/v1/newsarticles/topwords", get(news::top_words))
        .route("/api/v1/tweets/count/daily", get(tweets::daily_counts))
        .route(
            "/api/v1/tweets/socialsignals/count/daily",
            get(tweets::daily_signal_counts),
        )
        .route(
            "/api/v1/tweets/socialsignals/trend",
            get(tweets::signal_trends),
        )
        .route(
            "/api/v1/tweets/socialsignals/top/daily",
            get(tweets::top_tweets),
        )
        .route("/api/v1/pages/socialsignals/count", get(pages::signal_counts))
        .with_state(state)
}
