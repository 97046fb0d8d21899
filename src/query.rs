use crate::dates::DateRange;
use crate::errors::ApiError;
use crate::taxonomy::SignalTaxonomy;

/// A named axis results can be sliced along. Each maps to one column of a
/// read-model table; values are opaque externally-assigned codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    ArticleSource,
    ArticleCategory,
    TweetType,
    TweetCategory,
    SignalSource,
    SignalType,
    ContentCategory,
}

impl Dimension {
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::ArticleSource => "article_source",
            Dimension::ArticleCategory => "article_category",
            Dimension::TweetType => "tweet_type",
            Dimension::TweetCategory => "tweet_category",
            Dimension::SignalSource => "signal_source",
            Dimension::SignalType => "signal_type",
            Dimension::ContentCategory => "content_category",
        }
    }
}

/// Dimension codes are placed into filters only after shape validation, and
/// are always bound as parameters by the store adapter, never concatenated
/// into query text.
fn is_valid_code(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// An inclusion filter: `column IN (values...)`. An absent filter means no
/// restriction on that dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionFilter {
    pub dimension: Dimension,
    pub values: Vec<String>,
}

impl DimensionFilter {
    /// Returns `None` for an empty value list (no restriction). Fails if any
    /// code has an invalid shape, or if a signal-dimension code is unknown
    /// to the taxonomy.
    pub fn new(
        dimension: Dimension,
        values: &[String],
        taxonomy: &SignalTaxonomy,
    ) -> Result<Option<Self>, ApiError> {
        if values.is_empty() {
            return Ok(None);
        }

        for value in values {
            if !is_valid_code(value) {
                return Err(ApiError::IncorrectParameterFormat);
            }
            let known = match dimension {
                Dimension::SignalSource => taxonomy.is_known_source(value),
                Dimension::SignalType => taxonomy.is_known_type(value),
                _ => true,
            };
            if !known {
                return Err(ApiError::IncorrectParameterFormat);
            }
        }

        Ok(Some(DimensionFilter {
            dimension,
            values: values.to_vec(),
        }))
    }
}

/// The grouping dimensions active for one request, in canonical nesting
/// order: primary (source-like) first, secondary (category-like) second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingSelection {
    pub by_primary: bool,
    pub by_secondary: bool,
}

impl GroupingSelection {
    pub fn depth(&self) -> usize {
        usize::from(self.by_primary) + usize::from(self.by_secondary)
    }
}

/// How a two-stage query re-aggregates the inner per-signal-type rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollup {
    /// Single-stage query; the value is a plain aggregate.
    None,
    /// Inner stage groups by signal type, outer stage packs the per-type
    /// values into one JSON object per date.
    SignalBlob,
    /// Inner stage groups by signal type, outer stage sums the extra key
    /// away into a single numeric value per date.
    SignalSum,
}

/// An abstract query specification: filter predicates, select dimensions
/// and group-by dimensions. The store adapter renders it with placeholders
/// and binds every filter value; this type never contains query text.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub table: &'static str,
    pub date_column: &'static str,
    pub value_expr: &'static str,
    pub start: String,
    pub end: String,
    pub filters: Vec<DimensionFilter>,
    pub group_dims: Vec<Dimension>,
    pub rollup: Rollup,
}

pub struct QuerySpecBuilder<'a> {
    table: &'static str,
    date_column: &'static str,
    value_expr: &'static str,
    range: &'a DateRange,
    taxonomy: &'a SignalTaxonomy,
    filters: Vec<DimensionFilter>,
    group_dims: Vec<Dimension>,
    rollup: Rollup,
}

impl<'a> QuerySpecBuilder<'a> {
    pub fn new(
        table: &'static str,
        value_expr: &'static str,
        range: &'a DateRange,
        taxonomy: &'a SignalTaxonomy,
    ) -> Self {
        QuerySpecBuilder {
            table,
            date_column: "published_at",
            value_expr,
            range,
            taxonomy,
            filters: Vec::new(),
            group_dims: Vec::new(),
            rollup: Rollup::None,
        }
    }

    pub fn filter(mut self, dimension: Dimension, values: &[String]) -> Result<Self, ApiError> {
        if let Some(filter) = DimensionFilter::new(dimension, values, self.taxonomy)? {
            self.filters.push(filter);
        }
        Ok(self)
    }

    /// Adds the active grouping dimensions in canonical order. The date
    /// bucket is always the first grouping key and is implied.
    pub fn group_by(mut self, grouping: GroupingSelection, primary: Dimension, secondary: Dimension) -> Self {
        if grouping.by_primary {
            self.group_dims.push(primary);
        }
        if grouping.by_secondary {
            self.group_dims.push(secondary);
        }
        self
    }

    pub fn rollup(mut self, rollup: Rollup) -> Self {
        self.rollup = rollup;
        self
    }

    pub fn build(self) -> QuerySpec {
        QuerySpec {
            table: self.table,
            date_column: self.date_column,
            value_expr: self.value_expr,
            start: self.range.start_param(),
            end: self.range.end_param(),
            filters: self.filters,
            group_dims: self.group_dims,
            rollup: self.rollup,
        }
    }
}
