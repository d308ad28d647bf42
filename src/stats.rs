//! population statistics over the moisture values of a reading series

use crate::domain::Reading;

/// mean and population standard deviation of a series
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl PopulationStats {
    /// `None` for an empty series
    pub fn of(series: &[Reading]) -> Option<Self> {
        let (mean, std_dev) = mean_and_std_dev(series)?;
        Some(Self { count: series.len(), mean, std_dev })
    }
}

/// mean and standard deviation of the moisture values
///
/// uses the population formula (divisor `n`, not `n - 1`); the pooled
/// variance in `detection` is derived from it. `None` when `series` is empty.
/// moisture values are assumed finite, NaN or infinity propagate into the
/// result unchecked.
pub fn mean_and_std_dev(series: &[Reading]) -> Option<(f64, f64)> {
    if series.is_empty() {
        return None;
    }
    let n = series.len() as f64;

    let mean = series.iter().fold(0.0, |acc, r| acc + r.moisture / n);
    let variance = series
        .iter()
        .fold(0.0, |acc, r| acc + (r.moisture - mean).powi(2) / n);

    Some((mean, variance.sqrt()))
}
