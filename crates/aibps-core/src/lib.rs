#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/aibps/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod align;
pub mod audit;
pub mod composite;
pub mod normalize;
pub mod pillar;
pub mod series;
pub mod transform;

// Re-export the types most callers need
pub use align::{AlignPolicy, AlignSpec, Frequency, align};
pub use audit::{AuditLog, Condition, DropReason, Severity};
pub use composite::{
    COMPOSITE_COLUMN, CompositeBuilder, CompositeConfig, CompositeError, CompositeIndex,
    PillarWeights, SMOOTHED_COLUMN,
};
pub use normalize::{
    ClipRange, NormalizeError, Normalization, Normalizer, PercentileConfig, PercentileRank,
    Rebase, ShortHistory, rank_pct, rebase_100,
};
pub use pillar::{
    ColumnSelector, Pillar, PillarAggregator, PillarKind, UnknownPillar, aggregate_mean,
};
pub use series::{
    AlignedSeries, MonthGrid, MonthlySeries, NormalizedSeries, Observation, SeriesSet, TimeSeries,
    month_end,
};
pub use transform::Transform;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
