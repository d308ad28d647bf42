//! ==============================================================================
//! detection.rs - watering event detection
//! ==============================================================================
//!
//! purpose:
//!     decides whether a new reading comes from the same population as the
//!     recent history. a "different population" verdict is read by the rest
//!     of the host as "the plant was watered".
//!
//! strategies:
//!     - PooledT (default): treats the new reading as a second sample of size
//!       1 with zero spread, pools its variance with the history and compares
//!       the t statistic against an approximate two-tailed critical value.
//!     - ZScore: the older test. raw z score against the history's population
//!       sd, rejected at |z| >= 1.96.
//!
//! the critical value is a closed-form fit, not a Student-t table. it is
//! close around df = 5 and drifts at the extremes. keep it as written, stored
//! verdicts were produced with it.
//!
//! relationships:
//!     - uses: stats.rs (mean and population sd)
//!     - used by: server.rs (GET /readings/watering)
//!
//! ==============================================================================

use crate::domain::Reading;
use crate::stats::PopulationStats;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// statistic reported when the history has no spread and the new reading
/// differs from it. large enough to fail any critical value in use.
pub const DEGENERATE_STATISTIC: f64 = 81.92;

/// two-tailed z critical value at alpha = 0.05
pub const Z_CRITICAL: f64 = 1.96;

// critical(1) and the large-df limit of the t approximation
const T_CRITICAL_DF1: f64 = 63.6651;
const T_CRITICAL_LIMIT: f64 = 2.576;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    #[default]
    PooledT,
    ZScore,
}

impl DetectionStrategy {
    /// smallest history the strategy gives a meaningful verdict for
    pub fn min_history(self) -> usize {
        match self {
            DetectionStrategy::PooledT => 2,
            DetectionStrategy::ZScore => 1,
        }
    }

    pub fn is_same_population(self, reading: &Reading, history: &[Reading]) -> bool {
        match self {
            DetectionStrategy::PooledT => is_same_population(reading, history),
            DetectionStrategy::ZScore => is_same_population_z(reading, history),
        }
    }
}

/// approximate two-tailed Student-t critical value for `df` degrees of freedom
pub fn critical_value(df: f64) -> f64 {
    (1.0 / df.powf(2.3)) * (T_CRITICAL_DF1 - T_CRITICAL_LIMIT) + T_CRITICAL_LIMIT
}

/// pooled sd of a history of `n` readings with population sd `sd` and a
/// single extra observation with no spread
pub fn pooled_std_dev(n: usize, sd: f64) -> f64 {
    let n = n as f64;
    let degrees_of_freedom = n - 1.0;
    let sum_n = n + 1.0;
    let pooled_variance = (n * sd.powi(2) * sum_n) / (degrees_of_freedom * n);
    pooled_variance.sqrt()
}

/// t statistic of `moisture` against `stats` using the pooled sd
pub fn t_statistic(moisture: f64, stats: &PopulationStats) -> f64 {
    if stats.std_dev == 0.0 {
        return degenerate_statistic(moisture, stats.mean);
    }
    (moisture - stats.mean) / pooled_std_dev(stats.count, stats.std_dev)
}

/// z score of `moisture` against `stats` using the raw population sd
pub fn z_score(moisture: f64, stats: &PopulationStats) -> f64 {
    if stats.std_dev == 0.0 {
        return degenerate_statistic(moisture, stats.mean);
    }
    (moisture - stats.mean) / stats.std_dev
}

fn degenerate_statistic(moisture: f64, mean: f64) -> f64 {
    if moisture == mean {
        0.0
    } else {
        DEGENERATE_STATISTIC
    }
}

/// pooled t test: `true` when `reading` is indistinguishable from `history`
///
/// `history` needs at least two readings and finite moisture values; check
/// with `WateringDetector` first. an empty history reports `true`, and so
/// does a single reading: with zero degrees of freedom the critical value
/// is infinite.
pub fn is_same_population(reading: &Reading, history: &[Reading]) -> bool {
    let Some(stats) = PopulationStats::of(history) else {
        return true;
    };
    let degrees_of_freedom = (stats.count - 1) as f64;
    t_statistic(reading.moisture, &stats).abs() < critical_value(degrees_of_freedom)
}

/// z score test: `true` when `reading` is indistinguishable from `history`
pub fn is_same_population_z(reading: &Reading, history: &[Reading]) -> bool {
    let Some(stats) = PopulationStats::of(history) else {
        return true;
    };
    z_score(reading.moisture, &stats).abs() < Z_CRITICAL
}

#[derive(Debug, Error, PartialEq)]
pub enum PreconditionError {
    #[error("insufficient history: need {needed} readings, have {have}")]
    InsufficientHistory { needed: usize, have: usize },

    #[error("moisture value is not finite")]
    NonFiniteMoisture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub same_population: bool,
    /// history size the verdict was computed from
    pub samples: usize,
}

impl Verdict {
    pub fn watering(&self) -> bool {
        !self.same_population
    }
}

/// runs a strategy after checking its preconditions
#[derive(Clone, Copy, Debug, Default)]
pub struct WateringDetector {
    strategy: DetectionStrategy,
}

impl WateringDetector {
    pub fn new(strategy: DetectionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> DetectionStrategy {
        self.strategy
    }

    pub fn evaluate(&self, reading: &Reading, history: &[Reading]) -> Result<Verdict, PreconditionError> {
        let needed = self.strategy.min_history();
        if history.len() < needed {
            return Err(PreconditionError::InsufficientHistory { needed, have: history.len() });
        }
        if !reading.moisture.is_finite() || history.iter().any(|r| !r.moisture.is_finite()) {
            return Err(PreconditionError::NonFiniteMoisture);
        }

        Ok(Verdict {
            same_population: self.strategy.is_same_population(reading, history),
            samples: history.len(),
        })
    }
}
