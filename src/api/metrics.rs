use serde_json::{json, Value};
use tracing::warn;

use crate::cube::{signal_series, Cube, FlatCube, ResultRow};
use crate::dates::DateRange;
use crate::errors::ApiError;
use crate::query::{DimensionFilter, GroupingSelection, QuerySpecBuilder, Rollup};
use crate::trend::{parse_windows, trend_scores};
use crate::TARGET_WEB_REQUEST;

use super::domain::MetricsDomain;
use super::{parse_list, AppState, MetricsQuery};

/// Parses the `groups` parameter against the domain's two dimensions.
/// Grouping by a dimension requires a non-empty filter list for it, since
/// the cube is pre-built from the requested values.
fn parse_grouping(
    domain: &MetricsDomain,
    query: &MetricsQuery,
    primary_values: &[String],
    secondary_values: &[String],
) -> Result<GroupingSelection, ApiError> {
    let mut grouping = GroupingSelection::default();

    for group in parse_list(&query.groups) {
        let group = group.to_lowercase();
        if group == domain.primary_group_name {
            if primary_values.is_empty() {
                return Err(ApiError::InvalidGrouping(format!(
                    "If {} is in groups then the {} parameter cannot be empty.",
                    domain.primary_group_name, domain.primary_param_name
                )));
            }
            grouping.by_primary = true;
        } else if group == domain.secondary_group_name {
            if secondary_values.is_empty() {
                return Err(ApiError::InvalidGrouping(format!(
                    "If {} is in groups then the {} parameter cannot be empty.",
                    domain.secondary_group_name, domain.secondary_param_name
                )));
            }
            grouping.by_secondary = true;
        } else {
            return Err(ApiError::InvalidGrouping(format!(
                "Unknown grouping dimension: {}.",
                group
            )));
        }
    }

    Ok(grouping)
}

fn cube_levels(
    grouping: GroupingSelection,
    primary_values: &[String],
    secondary_values: &[String],
) -> Vec<Vec<String>> {
    let mut levels = Vec::new();
    if grouping.by_primary {
        levels.push(primary_values.to_vec());
    }
    if grouping.by_secondary {
        levels.push(secondary_values.to_vec());
    }
    levels
}

fn level_keys(grouping: GroupingSelection, domain: &MetricsDomain) -> Vec<&'static str> {
    let mut keys = Vec::new();
    if grouping.by_primary {
        keys.push(domain.primary_level_key);
    }
    if grouping.by_secondary {
        keys.push(domain.secondary_level_key);
    }
    keys
}

fn merge_rows<V: Clone>(cube: &mut Cube<V>, rows: Vec<ResultRow<V>>) {
    for row in rows {
        if !cube.merge_row(&row) {
            // Store rows outside the requested filter sets are dropped.
            warn!(
                target: TARGET_WEB_REQUEST,
                "Dropping result row outside the requested dimensions: {:?} @ {}",
                row.keys,
                row.date
            );
        }
    }
}

/// Wraps a flattened cube into the response tree: one `{id, ...}` node per
/// grouping value, the leaf payload under `leaf_key`.
fn assemble<V>(
    flat: FlatCube<V>,
    keys: &[&'static str],
    leaf_key: &'static str,
    leaf_fn: &impl Fn(Vec<V>) -> Value,
) -> (&'static str, Value) {
    match flat {
        FlatCube::Series(series) => (leaf_key, leaf_fn(series)),
        FlatCube::Groups(nodes) => {
            let level_key = keys.first().copied().unwrap_or("groups");
            let children: Vec<Value> = nodes
                .into_iter()
                .map(|node| {
                    let (key, value) = assemble(node.cube, &keys[1..], leaf_key, leaf_fn);
                    json!({ "id": node.id, key: value })
                })
                .collect();
            (level_key, Value::Array(children))
        }
    }
}

fn require<'a>(value: &'a Option<String>) -> Result<&'a str, ApiError> {
    value.as_deref().ok_or(ApiError::MissingParameters)
}

/// Daily publication counts, optionally grouped by the domain's dimensions.
pub async fn daily_counts(
    state: &AppState,
    domain: &MetricsDomain,
    query: &MetricsQuery,
) -> Result<Value, ApiError> {
    let start_date = require(&query.start_date)?;
    let end_date = require(&query.end_date)?;
    let range = DateRange::resolve(start_date, end_date)?;

    let primary_values = domain.primary_values(query);
    let secondary_values = domain.secondary_values(query);
    let grouping = parse_grouping(domain, query, &primary_values, &secondary_values)?;

    let spec = QuerySpecBuilder::new(
        domain.count_table,
        domain.count_value_expr,
        &range,
        &state.taxonomy,
    )
    .filter(domain.primary_dim, &primary_values)?
    .filter(domain.secondary_dim, &secondary_values)?
    .group_by(grouping, domain.primary_dim, domain.secondary_dim)
    .build();

    let rows = state.db.fetch_count_rows(&spec).await?;

    let levels = cube_levels(grouping, &primary_values, &secondary_values);
    let mut cube = Cube::build_empty(&levels, &range.buckets, &0.0);
    merge_rows(&mut cube, rows);

    let (key, payload) = assemble(
        cube.flatten(),
        &level_keys(grouping, domain),
        "data",
        &|series: Vec<f64>| json!(series),
    );

    let mut response = json!({ "start_date": start_date, "end_date": end_date });
    response[key] = payload;
    Ok(response)
}

/// Daily per-signal-type counts, optionally grouped by the domain's
/// dimensions. Values travel as per-date JSON blobs and are exploded into
/// one series per requested signal type.
pub async fn daily_signal_counts(
    state: &AppState,
    domain: &MetricsDomain,
    query: &MetricsQuery,
) -> Result<Value, ApiError> {
    let start_date = require(&query.start_date)?;
    let end_date = require(&query.end_date)?;
    let range = DateRange::resolve(start_date, end_date)?;

    let signal_sources = parse_list(&query.signal_sources);
    let signal_types = parse_list(&query.signal_types);
    let selection = state
        .taxonomy
        .resolve(Some(&signal_sources), Some(&signal_types));

    let primary_values = domain.primary_values(query);
    let secondary_values = domain.secondary_values(query);
    let grouping = parse_grouping(domain, query, &primary_values, &secondary_values)?;

    let spec = QuerySpecBuilder::new(domain.signals_table, "SUM(value)", &range, &state.taxonomy)
        .filter(domain.primary_dim, &primary_values)?
        .filter(domain.secondary_dim, &secondary_values)?
        .filter(crate::query::Dimension::SignalSource, &selection.sources)?
        .filter(crate::query::Dimension::SignalType, &selection.types)?
        .group_by(grouping, domain.primary_dim, domain.secondary_dim)
        .rollup(Rollup::SignalBlob)
        .build();

    let rows = state.db.fetch_blob_rows(&spec).await?;

    let levels = cube_levels(grouping, &primary_values, &secondary_values);
    let mut cube = Cube::build_empty(&levels, &range.buckets, &"{}".to_string());
    merge_rows(&mut cube, rows);

    let types = selection.types.clone();
    let (key, payload) = assemble(
        cube.flatten(),
        &level_keys(grouping, domain),
        "signals",
        &move |blobs: Vec<String>| json!(signal_series(&blobs, &types)),
    );

    let mut response = json!({ "start_date": start_date, "end_date": end_date });
    response[key] = payload;
    Ok(response)
}

/// Per-category trend scores over each requested trailing window. Signal
/// values are summed across types per category and day, then regressed.
pub async fn signal_trends(
    state: &AppState,
    domain: &MetricsDomain,
    query: &MetricsQuery,
) -> Result<Value, ApiError> {
    let date = require(&query.date)?;
    let days = require(&query.days)?;
    let windows = parse_windows(days)?;
    let range = DateRange::trailing(date, &windows)?;

    let secondary_values = domain.secondary_values(query);
    if secondary_values.is_empty() {
        return Err(ApiError::MissingParameters);
    }
    let primary_values = domain.primary_values(query);

    let signal_sources = parse_list(&query.signal_sources);
    let signal_types = parse_list(&query.signal_types);
    let selection = state
        .taxonomy
        .resolve(Some(&signal_sources), Some(&signal_types));

    // Trends are always evaluated per category.
    let grouping = GroupingSelection {
        by_primary: false,
        by_secondary: true,
    };

    let spec = QuerySpecBuilder::new(domain.signals_table, "SUM(value)", &range, &state.taxonomy)
        .filter(domain.primary_dim, &primary_values)?
        .filter(domain.secondary_dim, &secondary_values)?
        .filter(crate::query::Dimension::SignalSource, &selection.sources)?
        .filter(crate::query::Dimension::SignalType, &selection.types)?
        .group_by(grouping, domain.primary_dim, domain.secondary_dim)
        .rollup(Rollup::SignalSum)
        .build();

    let rows = state.db.fetch_count_rows(&spec).await?;

    let levels = cube_levels(grouping, &primary_values, &secondary_values);
    let mut cube = Cube::build_empty(&levels, &range.buckets, &0.0);
    merge_rows(&mut cube, rows);

    let categories: Vec<Value> = match cube.flatten() {
        FlatCube::Groups(nodes) => nodes
            .into_iter()
            .map(|node| {
                let series = match node.cube {
                    FlatCube::Series(series) => series,
                    FlatCube::Groups(_) => Vec::new(),
                };
                json!({ "id": node.id, "trends": trend_scores(&series, &windows) })
            })
            .collect(),
        FlatCube::Series(_) => Vec::new(),
    };

    Ok(json!({ "date": date, "categories": categories }))
}

/// The validated inputs of a top-items request.
pub struct TopQuery {
    pub range: DateRange,
    pub filters: Vec<DimensionFilter>,
    pub signal_type: String,
    pub limit: i64,
}

pub fn prepare_top_query(
    state: &AppState,
    domain: &MetricsDomain,
    query: &MetricsQuery,
) -> Result<TopQuery, ApiError> {
    let start_date = require(&query.start_date)?;
    let end_date = require(&query.end_date)?;
    let signal_type = require(&query.signal_type)?.to_string();
    let limit: i64 = require(&query.limit)?
        .parse()
        .map_err(|_| ApiError::IncorrectParameterFormat)?;
    if limit < 1 {
        return Err(ApiError::IncorrectParameterFormat);
    }

    let range = DateRange::resolve(start_date, end_date)?;

    if !state.taxonomy.is_known_type(&signal_type) {
        return Err(ApiError::IncorrectParameterFormat);
    }

    let mut filters = Vec::new();
    for (dim, values) in [
        (domain.primary_dim, domain.primary_values(query)),
        (domain.secondary_dim, domain.secondary_values(query)),
    ] {
        if let Some(filter) = DimensionFilter::new(dim, &values, &state.taxonomy)? {
            filters.push(filter);
        }
    }

    Ok(TopQuery {
        range,
        filters,
        signal_type,
        limit,
    })
}
