//! NaN-skipping summary statistics for bootstrap sampling distributions.
//!
//! Every function here treats NaN as "missing": sums count it as zero,
//! centers and spreads drop it, and percentiles interpolate linearly over
//! the non-missing values only.

use serde::Serialize;

/// Sum with NaN treated as zero. An all-NaN (or empty) input sums to 0.0.
pub fn nan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

/// Mean over the non-NaN values; NaN when none remain.
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation over the non-NaN values; NaN when none
/// remain, 0.0 for a single value.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum_sq += (v - mean) * (v - mean);
            count += 1;
        }
    }
    (sum_sq / count as f64).sqrt()
}

/// Percentile (0..=100) over the non-NaN values, with linear interpolation
/// between nearest ranks. NaN when no values remain.
pub fn nan_percentile(values: &[f64], percentile: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (percentile / 100.0) * (sorted.len() - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = (lower_idx + 1).min(sorted.len() - 1);
    let fraction = rank - lower_idx as f64;
    sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
}

/// Count of non-NaN values.
pub fn nan_count(values: &[f64]) -> u64 {
    values.iter().filter(|v| !v.is_nan()).count() as u64
}

/// Summary of one metric's bootstrap sampling distribution.
///
/// Both interval flavors are always computed and exposed side by side: the
/// standard-error method (`mean_minus_se`/`mean_plus_se`) and the
/// percentile method (`lower_percentile`/`upper_percentile`). Neither is
/// declared "best".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub se: f64,
    pub median: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub mean_minus_se: f64,
    pub mean_plus_se: f64,
    pub first_quartile: f64,
    pub third_quartile: f64,
    pub iqr: f64,
    /// Replicates with a defined (non-missing) value.
    pub num_obvs: u64,
    /// Total replicates drawn.
    pub num_reps: u64,
}

/// Summarize one metric's replicate values.
pub fn summarize(
    values: &[f64],
    se_multiplier: f64,
    lower_percentile: f64,
    upper_percentile: f64,
    num_reps: u64,
) -> DistributionSummary {
    let mean = nan_mean(values);
    let se = nan_std(values);
    let first_quartile = nan_percentile(values, 25.0);
    let third_quartile = nan_percentile(values, 75.0);
    DistributionSummary {
        mean,
        se,
        median: nan_percentile(values, 50.0),
        lower_percentile: nan_percentile(values, lower_percentile),
        upper_percentile: nan_percentile(values, upper_percentile),
        mean_minus_se: mean - se_multiplier * se,
        mean_plus_se: mean + se_multiplier * se,
        first_quartile,
        third_quartile,
        iqr: third_quartile - first_quartile,
        num_obvs: nan_count(values),
        num_reps,
    }
}
