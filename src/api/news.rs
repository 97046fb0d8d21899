use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::ApiError;
use crate::query::Dimension;
use crate::query::DimensionFilter;
use crate::TARGET_WEB_REQUEST;

use super::domain::NEWS;
use super::metrics;
use super::{AppState, MetricsQuery};

pub async fn daily_counts(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "News daily counts request");
    metrics::daily_counts(&state, &NEWS, &query).await.map(Json)
}

pub async fn daily_signal_counts(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "News daily signal counts request");
    metrics::daily_signal_counts(&state, &NEWS, &query)
        .await
        .map(Json)
}

pub async fn signal_trends(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "News signal trends request");
    metrics::signal_trends(&state, &NEWS, &query).await.map(Json)
}

pub async fn top_articles(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Top articles request");
    let top = metrics::prepare_top_query(&state, &NEWS, &query)?;
    let articles = state
        .db
        .fetch_top_articles(&top.range, &top.filters, &top.signal_type, top.limit)
        .await?;

    Ok(Json(json!({
        "start_date": query.start_date,
        "end_date": query.end_date,
        "data": articles,
    })))
}

/// Top-K TF-IDF keywords over the requested range.
pub async fn top_words(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Top words request");
    let start_date = query.start_date.as_deref().ok_or(ApiError::MissingParameters)?;
    let end_date = query.end_date.as_deref().ok_or(ApiError::MissingParameters)?;
    let range = crate::dates::DateRange::resolve(start_date, end_date)?;

    let limit = match query.limit.as_deref() {
        Some(raw) => raw.parse().map_err(|_| ApiError::IncorrectParameterFormat)?,
        None => 100,
    };

    let mut filters = Vec::new();
    for (dim, values) in [
        (
            Dimension::ArticleSource,
            super::parse_list(&query.article_sources),
        ),
        (
            Dimension::ArticleCategory,
            super::parse_list(&query.article_categories),
        ),
    ] {
        if let Some(filter) = DimensionFilter::new(dim, &values, &state.taxonomy)? {
            filters.push(filter);
        }
    }

    let words = state.db.top_words(&range, &filters, limit).await?;

    Ok(Json(json!({
        "start_date": start_date,
        "end_date": end_date,
        "data": words,
    })))
}
