//! Composite Builder
//!
//! Joins the available pillars on a common monthly grid and combines them with
//! weights renormalized, row by row, over the pillars actually present.
//! Rows without any signal from the core pillars are not reported.

pub mod builder;
pub mod weights;

pub use builder::{
    COMPOSITE_COLUMN, CompositeBuilder, CompositeConfig, CompositeIndex, SMOOTHED_COLUMN,
};
pub use weights::PillarWeights;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that make composite construction impossible
#[derive(Debug, Error)]
pub enum CompositeError {
    /// Nothing at all to aggregate
    #[error("No pillars available: every pillar is absent or wholly missing")]
    NoPillarsAvailable,

    /// Every row lacked a value for all core pillars
    #[error("No core signal: none of the core pillars [{0}] has a value on any row")]
    NoCoreSignal(String),

    /// A weight is negative or not finite
    #[error("Invalid weight for {pillar}: {weight}")]
    InvalidWeight {
        /// Pillar name
        pillar: String,
        /// Offending weight
        weight: f64,
    },

    /// The weights sum to zero
    #[error("Weights sum to zero")]
    ZeroTotalWeight,

    /// Smoothing the composite failed
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}
