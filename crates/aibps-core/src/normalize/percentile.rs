//! Trailing-window percentile rank
//!
//! Each observation is ranked against the most recent `window` observations
//! (itself included), ties sharing the average rank of their group, and the
//! rank is expressed on a 0-100 scale. Series with less history than the
//! window are ranked against everything seen so far (expanding window) once
//! a minimum number of observations is available.

use super::Normalizer;
use super::NormalizeError;
use crate::audit::{AuditLog, Condition};
use crate::series::MonthlySeries;
use crate::transform::{VALUE, evaluate};
use polars::prelude::{PolarsResult, RankMethod, RankOptions, col};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bounds applied to percentile scores to avoid hard 0/100 saturation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    /// Lower bound
    pub lo: f64,
    /// Upper bound
    pub hi: f64,
}

impl Default for ClipRange {
    fn default() -> Self {
        Self { lo: 1.0, hi: 99.0 }
    }
}

impl ClipRange {
    /// Clamp a score into the range.
    pub fn apply(&self, score: f64) -> f64 {
        score.clamp(self.lo, self.hi)
    }

    /// Check that `0 <= lo <= hi <= 100`.
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if !(0.0..=100.0).contains(&self.lo)
            || !(0.0..=100.0).contains(&self.hi)
            || self.lo > self.hi
        {
            return Err(NormalizeError::InvalidClip {
                lo: self.lo,
                hi: self.hi,
            });
        }
        Ok(())
    }
}

/// What to emit while fewer than `window` observations exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortHistory {
    /// Rank against all history so far once the minimum periods are met
    #[default]
    Expanding,
    /// Emit nothing until the window is full
    Withhold,
}

/// Configuration for percentile ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentileConfig {
    /// Trailing window length in observations (default: 120, ten years of months)
    pub window: usize,
    /// Fraction of the window required before emitting (default: 0.2)
    pub min_fraction: f64,
    /// Absolute floor on the minimum periods (default: 12)
    pub min_floor: usize,
    /// Short-history policy (default: expanding)
    pub short_history: ShortHistory,
    /// Clip range for scores (default: [1, 99]); `None` keeps raw 0-100 ranks
    pub clip: Option<ClipRange>,
}

impl Default for PercentileConfig {
    fn default() -> Self {
        Self {
            window: 120,
            min_fraction: 0.2,
            min_floor: 12,
            short_history: ShortHistory::Expanding,
            clip: Some(ClipRange::default()),
        }
    }
}

impl PercentileConfig {
    /// Config with the given window and default policies.
    pub fn with_window(window: usize) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    /// Observations required before a rank is emitted.
    ///
    /// `max(min_floor, ceil(window * min_fraction), 2)`, capped at the window,
    /// which is never taken below two.
    pub fn min_periods(&self) -> usize {
        let window = self.window.max(2);
        let fractional = (window as f64 * self.min_fraction).ceil() as usize;
        fractional.max(self.min_floor).max(2).min(window)
    }

    /// Reject impossible parameters.
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.window < 2 {
            return Err(NormalizeError::InvalidWindow(self.window));
        }
        if !(0.0..=1.0).contains(&self.min_fraction) {
            return Err(NormalizeError::InvalidMinFraction(self.min_fraction));
        }
        if let Some(clip) = &self.clip {
            clip.validate()?;
        }
        Ok(())
    }
}

/// Percentile-rank normalizer
#[derive(Debug, Clone)]
pub struct PercentileRank {
    config: PercentileConfig,
    invert: bool,
}

impl PercentileRank {
    /// Create a ranker; `invert` reports `100 - rank`.
    pub const fn new(config: PercentileConfig, invert: bool) -> Self {
        Self { config, invert }
    }

    /// Current configuration.
    pub const fn config(&self) -> &PercentileConfig {
        &self.config
    }

    /// Whether scores are inverted.
    pub const fn inverted(&self) -> bool {
        self.invert
    }
}

impl Normalizer for PercentileRank {
    fn name(&self) -> &str {
        "percentile"
    }

    fn normalize(
        &self,
        series: &MonthlySeries,
        audit: &mut AuditLog,
    ) -> PolarsResult<MonthlySeries> {
        if series.is_all_missing() {
            audit.record(Condition::AllMissing {
                series: series.name().to_string(),
            });
            return Ok(MonthlySeries::missing(series.name(), *series.grid()));
        }

        let window = self.config.window.max(2);
        let min_periods = self.config.min_periods();
        let required = match self.config.short_history {
            ShortHistory::Expanding => min_periods,
            ShortHistory::Withhold => window,
        };

        let observations = series.observation_count();
        if observations < window {
            audit.record(Condition::InsufficientHistory {
                series: series.name().to_string(),
                observations,
                window,
                min_periods: required,
            });
        }

        let mut history: Vec<f64> = Vec::with_capacity(observations);
        let scores = series
            .values()
            .iter()
            .map(|value| {
                let Some(value) = *value else {
                    return Ok(None);
                };
                history.push(value);
                let n = history.len();
                if n < required {
                    return Ok(None);
                }
                let rank = percentile_of_last(&history[n.saturating_sub(window)..])?;
                Ok(rank.map(|rank| {
                    let score = if self.invert { 100.0 - rank } else { rank };
                    self.config.clip.map_or(score, |clip| clip.apply(score))
                }))
            })
            .collect::<PolarsResult<Vec<_>>>()?;

        debug!(
            series = series.name(),
            window,
            required,
            invert = self.invert,
            "percentile ranked"
        );
        Ok(MonthlySeries::new(series.name(), *series.grid(), scores))
    }
}

/// Average-tie percentile rank of the last element, 0-100.
fn percentile_of_last(window: &[f64]) -> PolarsResult<Option<f64>> {
    let n = window.len();
    if n == 0 {
        return Ok(None);
    }
    let values: Vec<Option<f64>> = window.iter().copied().map(Some).collect();
    let ranks = evaluate(
        &values,
        col(VALUE).rank(
            RankOptions {
                method: RankMethod::Average,
                descending: false,
            },
            None,
        ),
    )?;
    Ok(ranks.last().copied().flatten().map(|rank| rank / n as f64 * 100.0))
}

/// Rank `series` with the default policies and the given window.
///
/// Windows shorter than two observations are widened to two. Conditions are
/// still emitted as tracing events but not collected; use [`PercentileRank`]
/// with an [`AuditLog`] to keep them.
///
/// # Errors
///
/// Returns an error if the underlying polars computation fails.
pub fn rank_pct(
    series: &MonthlySeries,
    window: usize,
    invert: bool,
) -> PolarsResult<MonthlySeries> {
    PercentileRank::new(PercentileConfig::with_window(window.max(2)), invert)
        .normalize(series, &mut AuditLog::new())
}
