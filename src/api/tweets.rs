use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::ApiError;
use crate::TARGET_WEB_REQUEST;

use super::domain::TWEETS;
use super::metrics;
use super::{AppState, MetricsQuery};

pub async fn daily_counts(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Tweet daily counts request");
    metrics::daily_counts(&state, &TWEETS, &query).await.map(Json)
}

pub async fn daily_signal_counts(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Tweet daily signal counts request");
    metrics::daily_signal_counts(&state, &TWEETS, &query)
        .await
        .map(Json)
}

pub async fn signal_trends(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Tweet signal trends request");
    metrics::signal_trends(&state, &TWEETS, &query).await.map(Json)
}

pub async fn top_tweets(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Top tweets request");
    let top = metrics::prepare_top_query(&state, &TWEETS, &query)?;
    let tweets = state
        .db
        .fetch_top_tweets(&top.range, &top.filters, &top.signal_type, top.limit)
        .await?;

    Ok(Json(json!({
        "start_date": query.start_date,
        "end_date": query.end_date,
        "data": tweets,
    })))
}
