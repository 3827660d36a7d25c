//! Weighted, renormalized composite of the available pillars

use super::{CompositeError, PillarWeights};
use crate::audit::{AuditLog, Condition, DropReason};
use crate::pillar::{Pillar, PillarKind};
use crate::series::{MonthGrid, MonthlySeries, TimeSeries};
use crate::transform::rolling_mean_values;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Output column holding the composite score.
pub const COMPOSITE_COLUMN: &str = "AIBPS";

/// Output column holding the smoothed composite.
pub const SMOOTHED_COLUMN: &str = "AIBPS_RA";

/// Configuration for composite construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Default pillar weights
    pub weights: PillarWeights,
    /// Pillars of which at least one must be present on a reported row
    /// (default: Market and Credit); empty disables the rule
    pub core_pillars: Vec<PillarKind>,
    /// Trailing window of the smoothed composite, in rows (default: 3)
    pub smoothing_window: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            weights: PillarWeights::default(),
            core_pillars: vec![PillarKind::Market, PillarKind::Credit],
            smoothing_window: 3,
        }
    }
}

/// The composite index with the pillar columns it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeIndex {
    dates: Vec<NaiveDate>,
    pillars: BTreeMap<PillarKind, Vec<Option<f64>>>,
    weights: Vec<BTreeMap<PillarKind, f64>>,
    composite: Vec<f64>,
    smoothed: Vec<f64>,
}

impl CompositeIndex {
    /// Month ends of the reported rows.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of reported rows.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no row was reported.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Pillars present as columns, in output order.
    pub fn pillar_kinds(&self) -> impl Iterator<Item = PillarKind> + '_ {
        self.pillars.keys().copied()
    }

    /// Values of one pillar column on the reported rows.
    pub fn pillar(&self, kind: PillarKind) -> Option<&[Option<f64>]> {
        self.pillars.get(&kind).map(Vec::as_slice)
    }

    /// Composite scores.
    pub fn composite(&self) -> &[f64] {
        &self.composite
    }

    /// Smoothed composite scores.
    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    /// Renormalized weights applied on `row`, present pillars only.
    pub fn applied_weights(&self, row: usize) -> Option<&BTreeMap<PillarKind, f64>> {
        self.weights.get(row)
    }

    /// Index of the most recent row.
    pub const fn latest(&self) -> Option<usize> {
        self.dates.len().checked_sub(1)
    }

    /// Composite as a raw series named [`COMPOSITE_COLUMN`].
    pub fn composite_series(&self) -> TimeSeries {
        TimeSeries::from_pairs(
            COMPOSITE_COLUMN,
            self.dates.iter().copied().zip(self.composite.iter().copied()),
        )
    }

    /// Smoothed composite as a raw series named [`SMOOTHED_COLUMN`].
    pub fn smoothed_series(&self) -> TimeSeries {
        TimeSeries::from_pairs(
            SMOOTHED_COLUMN,
            self.dates.iter().copied().zip(self.smoothed.iter().copied()),
        )
    }
}

#[derive(Debug, Default)]
struct Drops {
    no_pillars: usize,
    no_core: usize,
    zero_weight: usize,
}

/// Builds a [`CompositeIndex`] from pillars.
#[derive(Debug, Clone, Default)]
pub struct CompositeBuilder {
    config: CompositeConfig,
}

impl CompositeBuilder {
    /// Create a builder.
    pub const fn new(config: CompositeConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub const fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Combine `pillars` into the composite.
    ///
    /// Wholly missing pillars are ignored. When the same pillar is supplied
    /// twice the later one is used. Dropped rows are recorded in `audit`.
    ///
    /// # Errors
    ///
    /// [`CompositeError::InvalidWeight`] or [`CompositeError::ZeroTotalWeight`]
    /// when the configured weights are unusable,
    /// [`CompositeError::NoPillarsAvailable`] when no pillar has any value,
    /// [`CompositeError::NoCoreSignal`] when the core-pillar rule removes every
    /// row, [`CompositeError::ZeroTotalWeight`] when every remaining row carries
    /// zero weight.
    pub fn build(
        &self,
        pillars: &[Pillar],
        audit: &mut AuditLog,
    ) -> Result<CompositeIndex, CompositeError> {
        self.config.weights.validate()?;

        let present: BTreeMap<PillarKind, &MonthlySeries> = pillars
            .iter()
            .filter(|p| !p.series.is_all_missing())
            .map(|p| (p.kind, &p.series))
            .collect();
        if present.is_empty() {
            return Err(CompositeError::NoPillarsAvailable);
        }

        let grid = present
            .values()
            .fold(MonthGrid::empty(), |acc, s| acc.union(s.grid()));
        let columns: BTreeMap<PillarKind, MonthlySeries> = present
            .iter()
            .map(|(kind, series)| (*kind, series.reindex(&grid)))
            .collect();

        let mut index = CompositeIndex {
            dates: Vec::new(),
            pillars: columns.keys().map(|k| (*k, Vec::new())).collect(),
            weights: Vec::new(),
            composite: Vec::new(),
            smoothed: Vec::new(),
        };
        let mut drops = Drops::default();

        for (row, date) in grid.dates().enumerate() {
            let values: BTreeMap<PillarKind, f64> = columns
                .iter()
                .filter_map(|(kind, s)| s.values()[row].map(|v| (*kind, v)))
                .collect();

            if values.is_empty() {
                drops.no_pillars += 1;
                continue;
            }
            if !self.config.core_pillars.is_empty()
                && !self.config.core_pillars.iter().any(|k| values.contains_key(k))
            {
                drops.no_core += 1;
                continue;
            }
            let total: f64 = values.keys().map(|k| self.config.weights.get(*k)).sum();
            if total <= 0.0 {
                drops.zero_weight += 1;
                continue;
            }

            let weights: BTreeMap<PillarKind, f64> = values
                .keys()
                .map(|k| (*k, self.config.weights.get(*k) / total))
                .collect();
            let score: f64 = values.iter().map(|(k, v)| weights[k] * v).sum();

            index.dates.push(date);
            for (kind, column) in &mut index.pillars {
                column.push(values.get(kind).copied());
            }
            index.weights.push(weights);
            index.composite.push(score);
        }

        for (reason, count) in [
            (DropReason::NoPillars, drops.no_pillars),
            (DropReason::NoCorePillar, drops.no_core),
            (DropReason::ZeroWeight, drops.zero_weight),
        ] {
            if count > 0 {
                audit.record(Condition::RowsDropped { reason, count });
            }
        }

        if index.is_empty() {
            if drops.no_core > 0 {
                let core: Vec<String> = self
                    .config
                    .core_pillars
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                return Err(CompositeError::NoCoreSignal(core.join(", ")));
            }
            return Err(CompositeError::ZeroTotalWeight);
        }

        let scores: Vec<Option<f64>> = index.composite.iter().copied().map(Some).collect();
        index.smoothed = rolling_mean_values(&scores, self.config.smoothing_window, 1)?
            .into_iter()
            .flatten()
            .collect();

        debug!(
            pillars = index.pillars.len(),
            grid = grid.len(),
            "composite weights renormalized per row"
        );
        info!(
            rows = index.len(),
            start = ?index.dates.first(),
            end = ?index.dates.last(),
            "built composite"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
    }

    fn pillar(kind: PillarKind, values: Vec<Option<f64>>) -> Pillar {
        Pillar::from_series(kind, MonthlySeries::from_values(kind.to_string(), start(), values))
    }

    fn equal_weights() -> CompositeConfig {
        CompositeConfig {
            weights: PillarWeights::empty()
                .with(PillarKind::Market, 0.5)
                .with(PillarKind::Credit, 0.5),
            ..Default::default()
        }
    }

    #[test]
    fn test_two_pillars_equal_weights() {
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0), Some(70.0), Some(80.0)]),
            pillar(PillarKind::Credit, vec![Some(40.0), Some(50.0), Some(60.0)]),
        ];
        let index = CompositeBuilder::new(equal_weights())
            .build(&pillars, &mut AuditLog::new())
            .unwrap();

        for (got, want) in index.composite().iter().zip([50.0, 60.0, 70.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
        for (got, want) in index.smoothed().iter().zip([50.0, 55.0, 60.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_credit_puts_full_weight_on_market() {
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0), Some(70.0), Some(80.0)]),
            pillar(PillarKind::Credit, vec![None, None, None]),
        ];
        let index = CompositeBuilder::new(equal_weights())
            .build(&pillars, &mut AuditLog::new())
            .unwrap();

        assert_eq!(index.composite(), &[60.0, 70.0, 80.0]);
        assert!(index.pillar(PillarKind::Credit).is_none());
        assert_relative_eq!(index.applied_weights(0).unwrap()[&PillarKind::Market], 1.0);
    }

    #[test]
    fn test_row_without_core_pillar_is_dropped() {
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0), None, Some(80.0)]),
            pillar(PillarKind::Credit, vec![Some(40.0), None, Some(60.0)]),
            pillar(PillarKind::Adoption, vec![Some(10.0), Some(20.0), Some(30.0)]),
        ];
        let mut audit = AuditLog::new();
        let index = CompositeBuilder::default().build(&pillars, &mut audit).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.dates(),
            &[start(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()]
        );
        assert!(audit.iter().any(|c| matches!(
            c,
            Condition::RowsDropped {
                reason: DropReason::NoCorePillar,
                count: 1
            }
        )));
    }

    #[test]
    fn test_applied_weights_sum_to_one() {
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0), Some(70.0), None, Some(55.0)]),
            pillar(PillarKind::CapexSupply, vec![None, Some(30.0), Some(35.0), Some(40.0)]),
            pillar(PillarKind::Infra, vec![Some(90.0), None, Some(80.0), None]),
            pillar(PillarKind::Credit, vec![Some(20.0), Some(25.0), Some(30.0), None]),
            pillar(PillarKind::Sentiment, vec![Some(99.0), Some(99.0), Some(99.0), Some(99.0)]),
        ];
        let index = CompositeBuilder::default()
            .build(&pillars, &mut AuditLog::new())
            .unwrap();

        assert_eq!(index.len(), 4);
        for row in 0..index.len() {
            let weights = index.applied_weights(row).unwrap();
            assert_relative_eq!(weights.values().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(weights[&PillarKind::Sentiment], 0.0);
        }
        // Sentiment is reported as a column even without weight
        assert!(index.pillar(PillarKind::Sentiment).is_some());

        // row 1: Market 0.25, Capex 0.25, Credit 0.15 over a total of 0.65
        let expected = (0.25 * 70.0 + 0.25 * 30.0 + 0.15 * 25.0) / 0.65;
        assert_relative_eq!(index.composite()[1], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_removing_non_core_pillar_degrades_gracefully() {
        let market = pillar(PillarKind::Market, vec![Some(60.0), Some(70.0)]);
        let credit = pillar(PillarKind::Credit, vec![Some(40.0), Some(50.0)]);
        let infra = pillar(PillarKind::Infra, vec![Some(90.0), Some(95.0)]);
        let builder = CompositeBuilder::default();

        let full = builder
            .build(&[market.clone(), credit.clone(), infra], &mut AuditLog::new())
            .unwrap();
        let reduced = builder
            .build(&[market, credit], &mut AuditLog::new())
            .unwrap();

        assert_eq!(full.len(), reduced.len());
        assert!((full.composite()[0] - reduced.composite()[0]).abs() > 1e-9);
    }

    #[test]
    fn test_no_pillars_is_fatal() {
        let builder = CompositeBuilder::default();
        assert!(matches!(
            builder.build(&[], &mut AuditLog::new()),
            Err(CompositeError::NoPillarsAvailable)
        ));
        let empty = [pillar(PillarKind::Market, vec![None, None])];
        assert!(matches!(
            builder.build(&empty, &mut AuditLog::new()),
            Err(CompositeError::NoPillarsAvailable)
        ));
    }

    #[test]
    fn test_only_non_core_pillars_is_no_core_signal() {
        let pillars = [pillar(PillarKind::Adoption, vec![Some(10.0), Some(20.0)])];
        let result = CompositeBuilder::default().build(&pillars, &mut AuditLog::new());
        assert!(matches!(result, Err(CompositeError::NoCoreSignal(_))));
    }

    #[test]
    fn test_nan_weight_is_rejected() {
        let config = CompositeConfig {
            weights: PillarWeights::default().with(PillarKind::Infra, f64::NAN),
            ..Default::default()
        };
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0), Some(70.0)]),
            pillar(PillarKind::Infra, vec![Some(90.0), Some(95.0)]),
        ];
        let result = CompositeBuilder::new(config).build(&pillars, &mut AuditLog::new());
        assert!(matches!(
            result,
            Err(CompositeError::InvalidWeight { pillar, .. }) if pillar == "Infra"
        ));
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let config = CompositeConfig {
            weights: PillarWeights::empty()
                .with(PillarKind::Market, 1.0)
                .with(PillarKind::Credit, -0.5),
            ..Default::default()
        };
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0)]),
            pillar(PillarKind::Credit, vec![Some(20.0)]),
        ];
        let mut audit = AuditLog::new();
        let result = CompositeBuilder::new(config).build(&pillars, &mut audit);
        assert!(matches!(
            result,
            Err(CompositeError::InvalidWeight { pillar, weight })
                if pillar == "Credit" && weight == -0.5
        ));
        assert!(audit.is_empty());
    }

    #[test]
    fn test_zero_weight_rows_dropped() {
        let config = CompositeConfig {
            core_pillars: Vec::new(),
            ..Default::default()
        };
        let pillars = [
            pillar(PillarKind::Market, vec![Some(60.0), None]),
            pillar(PillarKind::Sentiment, vec![Some(50.0), Some(70.0)]),
        ];
        let mut audit = AuditLog::new();
        let index = CompositeBuilder::new(config).build(&pillars, &mut audit).unwrap();

        assert_eq!(index.len(), 1);
        assert!(audit.iter().any(|c| matches!(
            c,
            Condition::RowsDropped {
                reason: DropReason::ZeroWeight,
                ..
            }
        )));
    }

    #[test]
    fn test_smoothing_is_row_based() {
        let config = CompositeConfig {
            smoothing_window: 2,
            ..equal_weights()
        };
        let pillars = [pillar(
            PillarKind::Market,
            vec![Some(10.0), None, Some(30.0), Some(50.0)],
        )];
        let index = CompositeBuilder::new(config)
            .build(&pillars, &mut AuditLog::new())
            .unwrap();

        // the empty month is dropped, smoothing runs over the retained rows
        assert_eq!(index.composite(), &[10.0, 30.0, 50.0]);
        assert_eq!(index.smoothed(), &[10.0, 20.0, 40.0]);
        assert_eq!(index.composite_series().name(), COMPOSITE_COLUMN);
        assert_eq!(index.smoothed_series().len(), 3);
    }
}
