//! Normalization of aligned series into unit-free scores
//!
//! Two strategies are available:
//! - [`PercentileRank`]: position of each value within its trailing history,
//!   0-100, optionally inverted for series where higher is worse.
//! - [`Rebase`]: linear rescaling so that a baseline month equals 100.
//!
//! Neither strategy fails on bad data. A wholly missing input, a short history
//! or an unusable baseline is recorded in the [`AuditLog`] and degrades the
//! output instead.

pub mod percentile;
pub mod rebase;

pub use percentile::{ClipRange, PercentileConfig, PercentileRank, ShortHistory, rank_pct};
pub use rebase::{Rebase, rebase_100};

use crate::audit::AuditLog;
use crate::series::MonthlySeries;
use chrono::NaiveDate;
use polars::prelude::PolarsResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a normalizer is configured with impossible parameters
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    /// Window too short to rank anything
    #[error("Invalid percentile window: {0} (must be at least 2)")]
    InvalidWindow(usize),

    /// Minimum-periods fraction outside [0, 1]
    #[error("Invalid minimum-periods fraction: {0} (must be between 0 and 1)")]
    InvalidMinFraction(f64),

    /// Clip bounds inverted or outside [0, 100]
    #[error("Invalid clip range: [{lo}, {hi}]")]
    InvalidClip {
        /// Lower bound
        lo: f64,
        /// Upper bound
        hi: f64,
    },
}

/// Trait for strategies turning an aligned series into a normalized one
pub trait Normalizer {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Normalize `series`, recording any absorbed condition in `audit`.
    ///
    /// The output keeps the input's name and grid.
    ///
    /// # Errors
    ///
    /// Returns an error only if an underlying polars computation fails.
    fn normalize(
        &self,
        series: &MonthlySeries,
        audit: &mut AuditLog,
    ) -> PolarsResult<MonthlySeries>;
}

/// Serializable choice of normalization for an input recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Normalization {
    /// Trailing-window percentile rank
    Percentile {
        /// Report `100 - rank`
        #[serde(default)]
        invert: bool,
        /// Window override; `None` uses the configured window
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window: Option<usize>,
    },
    /// Rebase to 100 at the configured baseline date
    Rebase,
}

impl Normalization {
    /// Percentile rank with the configured window.
    pub const fn percentile(invert: bool) -> Self {
        Self::Percentile {
            invert,
            window: None,
        }
    }

    /// Build the normalizer, filling unset parameters from the defaults.
    pub fn build(
        &self,
        percentile: &PercentileConfig,
        baseline: NaiveDate,
    ) -> Result<Box<dyn Normalizer>, NormalizeError> {
        match *self {
            Self::Percentile { invert, window } => {
                let config = PercentileConfig {
                    window: window.unwrap_or(percentile.window),
                    ..percentile.clone()
                };
                config.validate()?;
                Ok(Box::new(PercentileRank::new(config, invert)))
            }
            Self::Rebase => Ok(Box::new(Rebase::new(baseline))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_applies_window_override() {
        let defaults = PercentileConfig::default();
        let baseline = NaiveDate::from_ymd_opt(2015, 12, 31).unwrap();

        let normalizer = Normalization::Percentile {
            invert: true,
            window: Some(36),
        }
        .build(&defaults, baseline)
        .unwrap();
        assert_eq!(normalizer.name(), "percentile");

        let rebase = Normalization::Rebase.build(&defaults, baseline).unwrap();
        assert_eq!(rebase.name(), "rebase");
    }

    #[test]
    fn test_build_rejects_bad_window() {
        let defaults = PercentileConfig::default();
        let baseline = NaiveDate::from_ymd_opt(2015, 12, 31).unwrap();
        let result = Normalization::Percentile {
            invert: false,
            window: Some(1),
        }
        .build(&defaults, baseline);
        assert!(matches!(result, Err(NormalizeError::InvalidWindow(1))));
    }
}
