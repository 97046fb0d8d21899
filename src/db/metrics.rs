use serde::Serialize;
use sqlx::Row;
use tracing::{debug, instrument};

use super::core::Database;
use crate::cube::ResultRow;
use crate::dates::DateRange;
use crate::query::{DimensionFilter, QuerySpec, Rollup};
use crate::TARGET_DB;

/// Renders the inclusion filters as `AND column IN (?, ...)` fragments with
/// one placeholder per value. Values are returned separately for binding.
pub(crate) fn render_filters(filters: &[DimensionFilter]) -> (String, Vec<String>) {
    let mut sql = String::new();
    let mut binds = Vec::new();
    for filter in filters {
        let placeholders = vec!["?"; filter.values.len()].join(", ");
        sql.push_str(&format!(
            " AND {} IN ({})",
            filter.dimension.column(),
            placeholders
        ));
        binds.extend(filter.values.iter().cloned());
    }
    (sql, binds)
}

/// Renders a `QuerySpec` into parameterized SQL plus its bind values, in
/// bind order: range start, range end, then each filter value.
pub(crate) fn render_spec(spec: &QuerySpec) -> (String, Vec<String>) {
    let date_expr = format!("strftime('%Y-%m-%d', {}) AS date", spec.date_column);
    let dims: String = spec
        .group_dims
        .iter()
        .map(|d| format!(", {}", d.column()))
        .collect();

    let (filter_sql, filter_binds) = render_filters(&spec.filters);
    let mut binds = vec![spec.start.clone(), spec.end.clone()];
    binds.extend(filter_binds);

    let sql = match spec.rollup {
        Rollup::None => format!(
            "SELECT {date_expr}{dims}, CAST({value} AS REAL) AS value \
             FROM {table} \
             WHERE {date_col} BETWEEN ? AND ?{filter_sql} \
             GROUP BY date{dims}",
            date_expr = date_expr,
            dims = dims,
            value = spec.value_expr,
            table = spec.table,
            date_col = spec.date_column,
            filter_sql = filter_sql,
        ),
        Rollup::SignalBlob | Rollup::SignalSum => {
            let inner = format!(
                "SELECT {date_expr}{dims}, signal_type, {value} AS value \
                 FROM {table} \
                 WHERE {date_col} BETWEEN ? AND ?{filter_sql} \
                 GROUP BY date{dims}, signal_type",
                date_expr = date_expr,
                dims = dims,
                value = spec.value_expr,
                table = spec.table,
                date_col = spec.date_column,
                filter_sql = filter_sql,
            );
            let outer_value = match spec.rollup {
                Rollup::SignalBlob => "json_group_object(signal_type, value)",
                _ => "CAST(SUM(value) AS REAL)",
            };
            format!(
                "SELECT date{dims}, {outer_value} AS value FROM ({inner}) tab GROUP BY date{dims}",
                dims = dims,
                outer_value = outer_value,
                inner = inner,
            )
        }
    };

    (sql, binds)
}

/// A top-ranked article by signal value within a date range.
#[derive(Debug, Clone, Serialize)]
pub struct RankedArticle {
    pub article_id: i64,
    pub article_url: String,
    pub article_headline: Option<String>,
    pub image_url: Option<String>,
    pub snippet: Option<String>,
    pub signal_value: f64,
}

/// A top-ranked tweet by signal value within a date range.
#[derive(Debug, Clone, Serialize)]
pub struct RankedTweet {
    pub tweet_id: i64,
    pub text: Option<String>,
    pub signal_value: f64,
}

impl Database {
    /// Executes a numeric-valued spec (single stage, or a summed rollup).
    #[instrument(target = "db", level = "debug", skip(self, spec))]
    pub async fn fetch_count_rows(
        &self,
        spec: &QuerySpec,
    ) -> Result<Vec<ResultRow<f64>>, sqlx::Error> {
        let (sql, binds) = render_spec(spec);
        debug!(target: TARGET_DB, "Executing metrics query on {}", spec.table);

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(self.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|row| ResultRow {
                keys: spec
                    .group_dims
                    .iter()
                    .map(|d| row.get::<String, _>(d.column()))
                    .collect(),
                date: row.get("date"),
                value: row.get::<f64, _>("value"),
            })
            .collect())
    }

    /// Executes a blob-valued spec: the outer stage packs per-signal-type
    /// values into one JSON object per date.
    #[instrument(target = "db", level = "debug", skip(self, spec))]
    pub async fn fetch_blob_rows(
        &self,
        spec: &QuerySpec,
    ) -> Result<Vec<ResultRow<String>>, sqlx::Error> {
        let (sql, binds) = render_spec(spec);
        debug!(target: TARGET_DB, "Executing signal metrics query on {}", spec.table);

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(self.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|row| ResultRow {
                keys: spec
                    .group_dims
                    .iter()
                    .map(|d| row.get::<String, _>(d.column()))
                    .collect(),
                date: row.get("date"),
                value: row.get::<String, _>("value"),
            })
            .collect())
    }

    /// The top articles by one signal type's value within a range.
    #[instrument(target = "db", level = "debug", skip(self, range, filters))]
    pub async fn fetch_top_articles(
        &self,
        range: &DateRange,
        filters: &[DimensionFilter],
        signal_type: &str,
        limit: i64,
    ) -> Result<Vec<RankedArticle>, sqlx::Error> {
        let (filter_sql, filter_binds) = render_filters(filters);
        let sql = format!(
            "SELECT m.item_id, m.signal_value, a.url, a.headline, a.image_url, a.snippet \
             FROM (SELECT item_id, signal_value \
                   FROM article_rankings \
                   WHERE published_at BETWEEN ? AND ?{filter_sql} AND signal_type = ? \
                   GROUP BY strftime('%Y-%m-%d', published_at), item_id, signal_value) m \
             JOIN articles a ON a.id = m.item_id \
             ORDER BY m.signal_value DESC \
             LIMIT ?",
        );

        let mut query = sqlx::query(&sql).bind(range.start_param()).bind(range.end_param());
        for bind in &filter_binds {
            query = query.bind(bind);
        }
        let rows = query
            .bind(signal_type)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RankedArticle {
                article_id: row.get("item_id"),
                article_url: row.get("url"),
                article_headline: row.get("headline"),
                image_url: row.get("image_url"),
                snippet: row.get("snippet"),
                signal_value: row.get("signal_value"),
            })
            .collect())
    }

    /// The top tweets by one signal type's value within a range.
    #[instrument(target = "db", level = "debug", skip(self, range, filters))]
    pub async fn fetch_top_tweets(
        &self,
        range: &DateRange,
        filters: &[DimensionFilter],
        signal_type: &str,
        limit: i64,
    ) -> Result<Vec<RankedTweet>, sqlx::Error> {
        let (filter_sql, filter_binds) = render_filters(filters);
        let sql = format!(
            "SELECT m.item_id, m.signal_value, t.text \
             FROM (SELECT item_id, signal_value \
                   FROM tweet_rankings \
                   WHERE published_at BETWEEN ? AND ?{filter_sql} AND signal_type = ? \
                   GROUP BY strftime('%Y-%m-%d', published_at), item_id, signal_value) m \
             JOIN tweets t ON t.id = m.item_id \
             ORDER BY m.signal_value DESC \
             LIMIT ?",
        );

        let mut query = sqlx::query(&sql).bind(range.start_param()).bind(range.end_param());
        for bind in &filter_binds {
            query = query.bind(bind);
        }
        let rows = query
            .bind(signal_type)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RankedTweet {
                tweet_id: row.get("item_id"),
                text: row.get("text"),
                signal_value: row.get("signal_value"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateRange;
    use crate::query::{Dimension, GroupingSelection, QuerySpecBuilder};
    use crate::taxonomy::SignalTaxonomy;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_placeholder_per_filter_value() {
        let taxonomy = SignalTaxonomy::default();
        let filters = vec![
            DimensionFilter::new(Dimension::ArticleSource, &strings(&["a", "b", "c"]), &taxonomy)
                .unwrap()
                .unwrap(),
        ];
        let (sql, binds) = render_filters(&filters);
        assert_eq!(sql, " AND article_source IN (?, ?, ?)");
        assert_eq!(binds, strings(&["a", "b", "c"]));
    }

    #[test]
    fn single_stage_spec_renders_date_first() {
        let taxonomy = SignalTaxonomy::default();
        let range = DateRange::resolve("2024-01-01", "2024-01-02").unwrap();
        let spec = QuerySpecBuilder::new(
            "article_counts_daily",
            "SUM(article_count)",
            &range,
            &taxonomy,
        )
        .filter(Dimension::ArticleCategory, &strings(&["politics"]))
        .unwrap()
        .group_by(
            GroupingSelection {
                by_primary: false,
                by_secondary: true,
            },
            Dimension::ArticleSource,
            Dimension::ArticleCategory,
        )
        .build();

        let (sql, binds) = render_spec(&spec);
        assert!(sql.starts_with("SELECT strftime('%Y-%m-%d', published_at) AS date, article_category"));
        assert!(sql.contains("GROUP BY date, article_category"));
        // No user value appears in the query text.
        assert!(!sql.contains("politics"));
        assert_eq!(
            binds,
            strings(&["2024-01-01 00:00:00", "2024-01-02 23:59:59", "politics"])
        );
    }

    #[test]
    fn blob_rollup_wraps_inner_query() {
        let taxonomy = SignalTaxonomy::default();
        let range = DateRange::resolve("2024-01-01", "2024-01-02").unwrap();
        let spec = QuerySpecBuilder::new("article_signals_daily", "SUM(value)", &range, &taxonomy)
            .rollup(Rollup::SignalBlob)
            .build();

        let (sql, _) = render_spec(&spec);
        assert!(sql.contains("json_group_object(signal_type, value)"));
        assert!(sql.contains("GROUP BY date, signal_type"));
        assert!(sql.trim_end().ends_with("GROUP BY date"));
    }

    #[test]
    fn summed_rollup_groups_the_extra_key_away() {
        let taxonomy = SignalTaxonomy::default();
        let range = DateRange::resolve("2024-01-01", "2024-01-02").unwrap();
        let spec = QuerySpecBuilder::new("tweet_signals_daily", "SUM(value)", &range, &taxonomy)
            .rollup(Rollup::SignalSum)
            .build();

        let (sql, _) = render_spec(&spec);
        assert!(sql.contains("CAST(SUM(value) AS REAL)"));
        assert!(sql.trim_end().ends_with("GROUP BY date"));
    }
}
