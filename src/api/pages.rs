use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::ApiError;
use crate::query::{Dimension, DimensionFilter};
use crate::TARGET_WEB_REQUEST;

use super::{parse_list, AppState, MetricsQuery};

/// Aggregated social-signal totals per page, optionally grouped by signal
/// source and/or signal type. Pages are addressed by pre-hashed url ids.
pub async fn signal_counts(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Value>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Page signal counts request");

    let url_ids = parse_list(&query.url_ids);
    if url_ids.is_empty() {
        return Err(ApiError::MissingParameters);
    }

    let signal_sources = parse_list(&query.signal_sources);
    let signal_types = parse_list(&query.signal_types);
    let selection = state
        .taxonomy
        .resolve(Some(&signal_sources), Some(&signal_types));

    let mut by_source = false;
    let mut by_type = false;
    for group in parse_list(&query.groups) {
        match group.to_lowercase().as_str() {
            "signal_source" => by_source = true,
            "signal_type" => by_type = true,
            other => {
                return Err(ApiError::InvalidGrouping(format!(
                    "Unknown grouping dimension: {}.",
                    other
                )))
            }
        }
    }

    let mut filters = Vec::new();
    for (dim, values) in [
        (Dimension::SignalSource, selection.sources.clone()),
        (Dimension::SignalType, selection.types.clone()),
    ] {
        if let Some(filter) = DimensionFilter::new(dim, &values, &state.taxonomy)? {
            filters.push(filter);
        }
    }

    let rows = state
        .db
        .fetch_page_signal_rows(&url_ids, &filters, by_source, by_type)
        .await?;

    // Default-filled totals per url, keyed by the active signal dimensions.
    let mut totals: BTreeMap<String, BTreeMap<(String, String), f64>> = BTreeMap::new();
    for url_id in &url_ids {
        let entry = totals.entry(url_id.clone()).or_default();
        match (by_source, by_type) {
            (false, false) => {
                entry.insert((String::new(), String::new()), 0.0);
            }
            (true, false) => {
                for source in &selection.sources {
                    entry.insert((source.clone(), String::new()), 0.0);
                }
            }
            (false, true) => {
                for signal_type in &selection.types {
                    entry.insert((String::new(), signal_type.clone()), 0.0);
                }
            }
            (true, true) => {
                for source in &selection.sources {
                    for signal_type in &selection.types {
                        entry.insert((source.clone(), signal_type.clone()), 0.0);
                    }
                }
            }
        }
    }

    for row in rows {
        let key = (
            row.signal_source.unwrap_or_default(),
            row.signal_type.unwrap_or_default(),
        );
        if let Some(entry) = totals.get_mut(&row.url_id) {
            // Rows outside the requested selection are dropped.
            if let Some(cell) = entry.get_mut(&key) {
                *cell = row.value;
            }
        }
    }

    let data: Vec<Value> = totals
        .into_iter()
        .map(|(url_id, cells)| {
            let mut node = json!({ "id": url_id });
            match (by_source, by_type) {
                (false, false) => {
                    node["value"] = json!(cells.values().next().copied().unwrap_or(0.0));
                }
                (true, false) => {
                    node["sources"] = Value::Array(
                        cells
                            .into_iter()
                            .map(|((source, _), value)| json!({ "id": source, "value": value }))
                            .collect(),
                    );
                }
                (false, true) => {
                    node["types"] = Value::Array(
                        cells
                            .into_iter()
                            .map(|((_, signal_type), value)| {
                                json!({ "id": signal_type, "value": value })
                            })
                            .collect(),
                    );
                }
                (true, true) => {
                    let mut per_source: BTreeMap<String, Vec<Value>> = BTreeMap::new();
                    for ((source, signal_type), value) in cells {
                        per_source
                            .entry(source)
                            .or_default()
                            .push(json!({ "id": signal_type, "value": value }));
                    }
                    node["sources"] = Value::Array(
                        per_source
                            .into_iter()
                            .map(|(source, types)| json!({ "id": source, "types": types }))
                            .collect(),
                    );
                }
            }
            node
        })
        .collect();

    Ok(Json(json!({ "data": data })))
}
