use sqlx::Row;
use tracing::{debug, instrument};

use super::core::Database;
use super::metrics::render_filters;
use crate::query::DimensionFilter;
use crate::TARGET_DB;

/// One aggregated signal total for a page, optionally sliced by signal
/// source and/or signal type.
#[derive(Debug, Clone)]
pub struct PageSignalRow {
    pub url_id: String,
    pub signal_source: Option<String>,
    pub signal_type: Option<String>,
    pub value: f64,
}

impl Database {
    /// Sums signal values per requested page, grouped by the active signal
    /// dimensions.
    #[instrument(target = "db", level = "debug", skip(self, url_ids, filters))]
    pub async fn fetch_page_signal_rows(
        &self,
        url_ids: &[String],
        filters: &[DimensionFilter],
        by_source: bool,
        by_type: bool,
    ) -> Result<Vec<PageSignalRow>, sqlx::Error> {
        let mut dims = String::new();
        if by_source {
            dims.push_str(", signal_source");
        }
        if by_type {
            dims.push_str(", signal_type");
        }

        let url_placeholders = vec!["?"; url_ids.len()].join(", ");
        let (filter_sql, filter_binds) = render_filters(filters);

        let sql = format!(
            "SELECT url_id{dims}, CAST(SUM(value) AS REAL) AS value \
             FROM page_signals \
             WHERE url_id IN ({url_placeholders}){filter_sql} \
             GROUP BY url_id{dims}",
        );
        debug!(target: TARGET_DB, "Executing page signal query");

        let mut query = sqlx::query(&sql);
        for url_id in url_ids {
            query = query.bind(url_id);
        }
        for bind in &filter_binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(self.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|row| PageSignalRow {
                url_id: row.get("url_id"),
                signal_source: by_source.then(|| row.get("signal_source")),
                signal_type: by_type.then(|| row.get("signal_type")),
                value: row.get("value"),
            })
            .collect())
    }
}
