// Robust statistics for calibration thresholds
//
// Percentiles use linear interpolation between closest ranks on a sorted
// copy, so p=0 and p=100 are the min and max and small sets stay stable.

/// IQR fence multiplier (Tukey)
pub const IQR_FENCE: f64 = 1.5;

/// Percentile of already-sorted data, `p` in [0, 100]
///
/// Returns `None` for empty input.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Percentile of unsorted data
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let sorted = sorted_copy(values);
    percentile_sorted(&sorted, p)
}

/// Ascending copy of `values`, NaN-free input assumed
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Result of an interquartile-range filter pass
#[derive(Debug, Clone, PartialEq)]
pub struct IqrFilter {
    pub q1: f64,
    pub q3: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// Kept samples, ascending
    pub kept: Vec<f64>,
    pub rejected: usize,
}

impl IqrFilter {
    /// Keep only samples within `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
    pub fn apply(values: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(values);
        let q1 = percentile_sorted(&sorted, 25.0)?;
        let q3 = percentile_sorted(&sorted, 75.0)?;
        let iqr = q3 - q1;
        let lower_fence = q1 - IQR_FENCE * iqr;
        let upper_fence = q3 + IQR_FENCE * iqr;

        let total = sorted.len();
        let kept: Vec<f64> = sorted
            .into_iter()
            .filter(|v| *v >= lower_fence && *v <= upper_fence)
            .collect();
        let rejected = total - kept.len();

        Some(Self {
            q1,
            q3,
            lower_fence,
            upper_fence,
            kept,
            rejected,
        })
    }
}
