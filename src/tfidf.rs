use serde::Serialize;

/// One ranked keyword with its tf-idf salience score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopWord {
    pub term: String,
    pub score: f64,
}

/// Stage 1: applies the frequency floor and normalizes the survivors.
///
/// Terms whose raw occurrence count does not exceed the number of days in
/// the range are treated as noise and dropped; each kept term's count is
/// divided by the number of distinct terms seen in the range, counted
/// before the floor is applied.
pub fn normalize_frequencies(raw: Vec<(String, f64)>, day_count: usize) -> Vec<(String, f64)> {
    let distinct_terms = raw.len() as f64;
    let kept: Vec<(String, f64)> = raw
        .into_iter()
        .filter(|(_, count)| *count > day_count as f64)
        .collect();

    if kept.is_empty() {
        return Vec::new();
    }

    kept.into_iter()
        .map(|(term, count)| (term, count / distinct_terms))
        .collect()
}

/// Stage 2: scores terms joined against the global document-frequency
/// table and returns the top `limit` by descending `tf · ln(N/df)`.
/// Terms without a usable document frequency are excluded.
pub fn score_and_rank(
    joined: Vec<(String, f64, f64)>,
    corpus_size: f64,
    limit: usize,
) -> Vec<TopWord> {
    let mut scored: Vec<TopWord> = joined
        .into_iter()
        .filter(|(_, _, df)| *df > 0.0)
        .map(|(term, tf, df)| TopWord {
            term,
            score: tf * (corpus_size / df).ln(),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
