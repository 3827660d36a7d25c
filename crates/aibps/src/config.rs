//! Index configuration
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional JSON file, then `AIBPS_*` environment variables. Command-line
//! flags are applied on top by the binary.

use aibps_core::{
    ClipRange, CompositeConfig, CompositeError, NormalizeError, PercentileConfig, PillarKind,
    PillarWeights,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Comma-separated `Pillar=weight` pairs merged into the configured weights.
pub const ENV_WEIGHTS: &str = "AIBPS_WEIGHTS";
/// Percentile window in months.
pub const ENV_PERCENTILE_WINDOW: &str = "AIBPS_PERCENTILE_WINDOW";
/// Fraction of the window required before ranks are emitted.
pub const ENV_MIN_FRACTION: &str = "AIBPS_MIN_FRACTION";
/// Rebase date, `YYYY-MM-DD`.
pub const ENV_BASELINE: &str = "AIBPS_BASELINE";
/// Smoothing window of `AIBPS_RA` in rows.
pub const ENV_SMOOTHING_WINDOW: &str = "AIBPS_SMOOTHING_WINDOW";
/// Percentile clip, `off` or `lo,hi`.
pub const ENV_CLIP: &str = "AIBPS_CLIP";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`IndexConfig`].
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment variable could not be parsed.
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Env {
        /// Variable name
        var: String,
        /// Raw value
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// A setting is outside its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The weight vector is unusable.
    #[error(transparent)]
    Weight(#[from] CompositeError),

    /// The percentile policy is unusable.
    #[error(transparent)]
    Percentile(#[from] NormalizeError),
}

/// Configuration of one index run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Pillar weights (default: Market 0.25, Capex_Supply 0.25, Infra 0.20,
    /// Adoption 0.15, Credit 0.15; unlisted pillars weigh 0)
    pub weights: PillarWeights,

    /// Pillars of which one must be present on every reported row
    /// (default: Market, Credit)
    pub core_pillars: Vec<PillarKind>,

    /// Percentile normalization policy (default: 120-month window,
    /// expanding over short history, clipped to [1, 99])
    pub percentile: PercentileConfig,

    /// Month that rebased components equal 100 at (default: 2015-12-31)
    pub baseline: NaiveDate,

    /// Rolling window of the smoothed composite in rows (default: 3)
    pub smoothing_window: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let composite = CompositeConfig::default();
        Self {
            weights: composite.weights,
            core_pillars: composite.core_pillars,
            percentile: PercentileConfig::default(),
            baseline: default_baseline(),
            smoothing_window: composite.smoothing_window,
        }
    }
}

fn default_baseline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 12, 31).unwrap_or_default()
}

impl IndexConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded configuration file");
        Self::from_json(&content)
    }

    /// Defaults, then `path` if given, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a variable cannot be
    /// parsed, or the result fails [`Self::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.apply_env(|var| std::env::var(var).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// `AIBPS_WEIGHTS` is merged into the existing weights, so pillars it
    /// does not name keep their weight.
    pub fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_WEIGHTS) {
            for (kind, weight) in parse_weights(&raw)? {
                self.weights.set(kind, weight);
            }
        }
        if let Some(raw) = lookup(ENV_PERCENTILE_WINDOW) {
            self.percentile.window = parse_env(ENV_PERCENTILE_WINDOW, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MIN_FRACTION) {
            self.percentile.min_fraction = parse_env(ENV_MIN_FRACTION, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BASELINE) {
            self.baseline = parse_env(ENV_BASELINE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SMOOTHING_WINDOW) {
            self.smoothing_window = parse_env(ENV_SMOOTHING_WINDOW, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CLIP) {
            self.percentile.clip = parse_clip(&raw)?;
        }
        Ok(self)
    }

    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Rejects negative or non-finite weights, an all-zero weight vector, an
    /// invalid percentile policy and a zero smoothing window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.percentile.validate()?;
        if self.smoothing_window == 0 {
            return Err(ConfigError::Invalid(
                "smoothing_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the composite stage.
    pub fn composite(&self) -> CompositeConfig {
        CompositeConfig {
            weights: self.weights.clone(),
            core_pillars: self.core_pillars.clone(),
            smoothing_window: self.smoothing_window,
        }
    }

    /// Pretty JSON rendering of the effective configuration.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn env_error(var: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| env_error(var, raw, e))
}

fn parse_weights(raw: &str) -> Result<Vec<(PillarKind, f64)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(PillarKind, f64), ConfigError> {
            let (name, weight) = pair
                .split_once('=')
                .ok_or_else(|| env_error(ENV_WEIGHTS, raw, "expected Pillar=weight"))?;
            let kind: PillarKind = name.parse().map_err(|e| env_error(ENV_WEIGHTS, raw, e))?;
            Ok((kind, parse_env(ENV_WEIGHTS, weight)?))
        })
        .collect()
}

fn parse_clip(raw: &str) -> Result<Option<ClipRange>, ConfigError> {
    let raw_trimmed = raw.trim();
    if raw_trimmed.eq_ignore_ascii_case("off") || raw_trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let (lo, hi) = raw_trimmed
        .split_once(',')
        .ok_or_else(|| env_error(ENV_CLIP, raw, "expected `off` or `lo,hi`"))?;
    Ok(Some(ClipRange {
        lo: parse_env(ENV_CLIP, lo)?,
        hi: parse_env(ENV_CLIP, hi)?,
    }))
}
