//! Pillar Aggregator
//!
//! A pillar is the unweighted, skip-missing mean of the normalized components
//! that belong to one theme. Which components belong to a pillar is decided by
//! a [`ColumnSelector`]: explicit names first, then a prefix/suffix naming
//! convention, and as a last resort every available column.

use crate::audit::{AuditLog, Condition};
use crate::series::{MonthlySeries, SeriesSet};
use crate::transform::reduce_rows;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// The thematic pillars of the composite.
///
/// Ordering follows declaration order and fixes the column order of outputs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum PillarKind {
    /// Semiconductor and tech equity momentum
    Market,
    /// Capital expenditure and supply-side investment
    #[serde(rename = "Capex_Supply")]
    #[display("Capex_Supply")]
    CapexSupply,
    /// Physical infrastructure build-out
    Infra,
    /// Technology adoption
    Adoption,
    /// Credit conditions (inverted spreads)
    Credit,
    /// Search-interest hype
    Sentiment,
}

impl PillarKind {
    /// Every pillar in output order.
    pub const ALL: [Self; 6] = [
        Self::Market,
        Self::CapexSupply,
        Self::Infra,
        Self::Adoption,
        Self::Credit,
        Self::Sentiment,
    ];
}

/// Unrecognized pillar name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown pillar: {0}")]
pub struct UnknownPillar(pub String);

impl FromStr for PillarKind {
    type Err = UnknownPillar;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPillar(s.to_string()))
    }
}

/// An aggregated pillar with the components that fed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pillar {
    /// Which pillar this is
    pub kind: PillarKind,
    /// Pillar score, named after the pillar
    pub series: MonthlySeries,
    /// Selected normalized components
    pub components: SeriesSet,
}

impl Pillar {
    /// Wrap an existing series as a single-component pillar.
    pub fn from_series(kind: PillarKind, series: MonthlySeries) -> Self {
        let components = std::iter::once(series.clone()).collect();
        Self {
            kind,
            series: series.renamed(kind.to_string()),
            components,
        }
    }

    /// Pillar name as used for output columns.
    pub fn name(&self) -> &str {
        self.series.name()
    }
}

/// Rule choosing which columns feed a pillar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSelector {
    /// Required name prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Required name suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Explicit column names, taking precedence over the naming convention
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl ColumnSelector {
    /// Select columns starting with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Select columns ending with `suffix`.
    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..Self::default()
        }
    }

    /// Select the named columns.
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether `name` satisfies the prefix/suffix convention.
    ///
    /// A selector without prefix or suffix matches nothing by convention.
    pub fn matches(&self, name: &str) -> bool {
        if self.prefix.is_none() && self.suffix.is_none() {
            return false;
        }
        self.prefix.as_deref().is_none_or(|p| name.starts_with(p))
            && self.suffix.as_deref().is_none_or(|s| name.ends_with(s))
    }

    /// Columns of `set` feeding `pillar`.
    ///
    /// Falls back to every column in the set, recording
    /// [`Condition::SelectorFallback`], when nothing matches.
    pub fn select<'a>(
        &self,
        set: &'a SeriesSet,
        pillar: &str,
        audit: &mut AuditLog,
    ) -> Vec<&'a MonthlySeries> {
        let selected: Vec<&MonthlySeries> = if self.columns.is_empty() {
            set.iter().filter(|s| self.matches(s.name())).collect()
        } else {
            self.columns.iter().filter_map(|c| set.get(c)).collect()
        };

        if selected.is_empty() && !set.is_empty() {
            audit.record(Condition::SelectorFallback {
                pillar: pillar.to_string(),
                columns: set.names().into_iter().map(str::to_string).collect(),
            });
            return set.iter().collect();
        }
        selected
    }
}

/// Row-wise mean of `components` on their union grid, skipping missing values.
///
/// A slot is missing only when every component is missing there.
pub fn aggregate_mean(name: impl Into<String>, components: &[&MonthlySeries]) -> MonthlySeries {
    reduce_rows(name, components, |values| {
        values.iter().sum::<f64>() / values.len() as f64
    })
}

/// Builds one pillar from its normalized components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PillarAggregator {
    kind: PillarKind,
    selector: ColumnSelector,
}

impl PillarAggregator {
    /// Create an aggregator.
    pub const fn new(kind: PillarKind, selector: ColumnSelector) -> Self {
        Self { kind, selector }
    }

    /// Pillar produced by this aggregator.
    pub const fn kind(&self) -> PillarKind {
        self.kind
    }

    /// Component selection rule.
    pub const fn selector(&self) -> &ColumnSelector {
        &self.selector
    }

    /// Aggregate the pillar, or `None` when it cannot be produced.
    ///
    /// An absent pillar is recorded as [`Condition::PillarUnavailable`] and
    /// is left out of downstream outputs entirely.
    pub fn aggregate(&self, components: &SeriesSet, audit: &mut AuditLog) -> Option<Pillar> {
        let name = self.kind.to_string();
        if components.is_empty() {
            audit.record(Condition::PillarUnavailable {
                pillar: name,
                reason: "no component available".to_string(),
            });
            return None;
        }

        let selected = self.selector.select(components, &name, audit);
        let series = aggregate_mean(name.as_str(), &selected);
        if series.is_all_missing() {
            audit.record(Condition::PillarUnavailable {
                pillar: name,
                reason: "every component missing".to_string(),
            });
            return None;
        }

        debug!(
            pillar = %self.kind,
            components = selected.len(),
            months = series.len(),
            "aggregated pillar"
        );
        Some(Pillar {
            kind: self.kind,
            series,
            components: selected.into_iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()
    }

    fn s(name: &str, values: Vec<Option<f64>>) -> MonthlySeries {
        MonthlySeries::from_values(name, start(), values)
    }

    #[rstest]
    #[case("Market", PillarKind::Market)]
    #[case("Capex_Supply", PillarKind::CapexSupply)]
    #[case("capex_supply", PillarKind::CapexSupply)]
    #[case(" Credit ", PillarKind::Credit)]
    fn test_pillar_kind_from_str(#[case] input: &str, #[case] expected: PillarKind) {
        assert_eq!(input.parse::<PillarKind>().unwrap(), expected);
    }

    #[test]
    fn test_pillar_kind_display_and_unknown() {
        assert_eq!(PillarKind::CapexSupply.to_string(), "Capex_Supply");
        assert_eq!(PillarKind::Sentiment.to_string(), "Sentiment");
        assert!("Vibes".parse::<PillarKind>().is_err());
    }

    #[test]
    fn test_mean_skips_missing_components() {
        let a = s("a", vec![Some(10.0), None, None]);
        let b = s("b", vec![Some(30.0), Some(40.0), None]);
        let pillar = aggregate_mean("p", &[&a, &b]);
        // missing, never zero, when every component is missing
        assert_eq!(pillar.values(), &[Some(20.0), Some(40.0), None]);
    }

    #[test]
    fn test_selector_prefix_and_suffix() {
        let set: SeriesSet = [
            s("MKT_SOXX_1y_pct", vec![Some(1.0)]),
            s("HY_OAS_pct", vec![Some(2.0)]),
            s("IG_OAS_pct", vec![Some(3.0)]),
        ]
        .into_iter()
        .collect();
        let mut audit = AuditLog::new();

        let credit = ColumnSelector::suffix("OAS_pct").select(&set, "Credit", &mut audit);
        assert_eq!(credit.len(), 2);
        let market = ColumnSelector::prefix("MKT_").select(&set, "Market", &mut audit);
        assert_eq!(market.len(), 1);
        assert!(audit.is_empty());
    }

    #[test]
    fn test_selector_falls_back_to_all_columns() {
        let set: SeriesSet = [s("x", vec![Some(1.0)]), s("y", vec![Some(3.0)])]
            .into_iter()
            .collect();
        let mut audit = AuditLog::new();
        let selected = ColumnSelector::prefix("MKT_").select(&set, "Market", &mut audit);

        assert_eq!(selected.len(), 2);
        assert!(matches!(
            audit.entries(),
            [Condition::SelectorFallback { pillar, columns }]
                if pillar == "Market" && columns.len() == 2
        ));
    }

    #[test]
    fn test_explicit_columns_take_precedence() {
        let set: SeriesSet = [s("MKT_a", vec![Some(1.0)]), s("other", vec![Some(3.0)])]
            .into_iter()
            .collect();
        let selector = ColumnSelector {
            prefix: Some("MKT_".to_string()),
            columns: vec!["other".to_string()],
            ..Default::default()
        };
        let selected = selector.select(&set, "Market", &mut AuditLog::new());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "other");
    }

    #[test]
    fn test_aggregator_builds_named_pillar() {
        let set: SeriesSet = [
            s("HY_OAS_pct", vec![Some(40.0), None]),
            s("IG_OAS_pct", vec![Some(60.0), Some(30.0)]),
        ]
        .into_iter()
        .collect();
        let aggregator =
            PillarAggregator::new(PillarKind::Credit, ColumnSelector::suffix("OAS_pct"));
        let pillar = aggregator.aggregate(&set, &mut AuditLog::new()).unwrap();

        assert_eq!(pillar.name(), "Credit");
        assert_eq!(pillar.series.values(), &[Some(50.0), Some(30.0)]);
        assert_eq!(pillar.components.len(), 2);
    }

    #[test]
    fn test_aggregator_reports_unavailable_pillar() {
        let aggregator = PillarAggregator::new(PillarKind::Infra, ColumnSelector::prefix("Infra_"));
        let mut audit = AuditLog::new();

        assert!(aggregator.aggregate(&SeriesSet::new(), &mut audit).is_none());

        let set: SeriesSet = [s("Infra_Power_Grid", vec![None, None])].into_iter().collect();
        assert!(aggregator.aggregate(&set, &mut audit).is_none());

        assert_eq!(audit.for_subject("Infra").count(), 2);
    }
}
