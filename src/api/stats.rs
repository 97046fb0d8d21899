use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::db::stats::RepositoryStats;
use crate::errors::ApiError;
use crate::TARGET_WEB_REQUEST;

use super::AppState;

pub async fn repository_stats(
    State(state): State<AppState>,
) -> Result<Json<RepositoryStats>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Repository stats request");
    let stats = state.db.repository_stats().await?;
    Ok(Json(stats))
}
