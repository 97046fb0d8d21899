use serde::Serialize;

use crate::errors::ApiError;

/// The trend score of one trailing window: the ordinary-least-squares slope
/// of the max-normalized daily series, scaled by 100 and rounded to two
/// decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendScore {
    pub day: u32,
    pub value: f64,
}

/// Validates a comma-separated `days` parameter: every entry must be an
/// integer window length of at least 2.
pub fn parse_windows(raw: &str) -> Result<Vec<u32>, ApiError> {
    let mut windows = Vec::new();
    for part in raw.split(',') {
        let days: u32 = part
            .trim()
            .parse()
            .map_err(|_| ApiError::IncorrectParameterFormat)?;
        if days < 2 {
            return Err(ApiError::IncorrectParameterFormat);
        }
        windows.push(days);
    }
    Ok(windows)
}

/// Ordinary least squares over (index, value) pairs.
fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }

    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (i, value) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        covariance += dx * (value - mean_y);
        variance += dx * dx;
    }

    if variance == 0.0 {
        return 0.0;
    }
    covariance / variance
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes the trend score of each requested trailing window over a daily
/// series. Each window takes the last `d` values (clamped to the series
/// length), normalizes them by the window maximum and regresses the
/// normalized points. An all-zero window has no meaningful magnitude to
/// normalize against and scores 0 rather than propagating a division by
/// zero.
pub fn trend_scores(series: &[f64], windows: &[u32]) -> Vec<TrendScore> {
    windows
        .iter()
        .map(|&day| {
            let take = (day as usize).min(series.len());
            let window = &series[series.len() - take..];

            let max = window.iter().cloned().fold(f64::MIN, f64::max);
            let slope = if max <= 0.0 {
                0.0
            } else {
                let normalized: Vec<f64> = window.iter().map(|v| v / max).collect();
                ols_slope(&normalized)
            };

            TrendScore {
                day,
                value: round2(slope * 100.0),
            }
        })
        .collect()
}
