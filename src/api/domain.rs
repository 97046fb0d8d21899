use crate::query::Dimension;

use super::MetricsQuery;

/// Which item repository backs a domain's ranking endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    News,
    Tweets,
}

/// Everything that differs between the news and tweet reporting paths: the
/// backing tables, the two grouping dimensions and the request/response
/// vocabulary. The handlers themselves are shared.
#[derive(Debug, Clone, Copy)]
pub struct MetricsDomain {
    pub kind: DomainKind,
    pub count_table: &'static str,
    pub count_value_expr: &'static str,
    pub signals_table: &'static str,
    pub primary_dim: Dimension,
    pub secondary_dim: Dimension,
    /// Accepted `groups` entries, lowercased.
    pub primary_group_name: &'static str,
    pub secondary_group_name: &'static str,
    /// The query parameters carrying the dimension filter lists.
    pub primary_param_name: &'static str,
    pub secondary_param_name: &'static str,
    /// The response keys wrapping each grouping level.
    pub primary_level_key: &'static str,
    pub secondary_level_key: &'static str,
}

pub const NEWS: MetricsDomain = MetricsDomain {
    kind: DomainKind::News,
    count_table: "article_counts_daily",
    count_value_expr: "SUM(article_count)",
    signals_table: "article_signals_daily",
    primary_dim: Dimension::ArticleSource,
    secondary_dim: Dimension::ArticleCategory,
    primary_group_name: "article_source",
    secondary_group_name: "article_category",
    primary_param_name: "article_sources",
    secondary_param_name: "article_categories",
    primary_level_key: "sources",
    secondary_level_key: "categories",
};

pub const TWEETS: MetricsDomain = MetricsDomain {
    kind: DomainKind::Tweets,
    count_table: "tweet_counts_daily",
    count_value_expr: "SUM(tweet_count)",
    signals_table: "tweet_signals_daily",
    primary_dim: Dimension::TweetType,
    secondary_dim: Dimension::TweetCategory,
    primary_group_name: "tweet_type",
    secondary_group_name: "tweet_category",
    primary_param_name: "tweet_types",
    secondary_param_name: "tweet_categories",
    primary_level_key: "types",
    secondary_level_key: "categories",
};

impl MetricsDomain {
    pub fn primary_values(&self, query: &MetricsQuery) -> Vec<String> {
        match self.kind {
            DomainKind::News => super::parse_list(&query.article_sources),
            DomainKind::Tweets => super::parse_list(&query.tweet_types),
        }
    }

    pub fn secondary_values(&self, query: &MetricsQuery) -> Vec<String> {
        match self.kind {
            DomainKind::News => super::parse_list(&query.article_categories),
            DomainKind::Tweets => super::parse_list(&query.tweet_categories),
        }
    }
}
