//! Audit trail of absorbed data conditions
//!
//! Per-series problems never abort a run. Each one is recorded here as a
//! [`Condition`] and emitted as a `tracing` event, so the output of a run can
//! always be accompanied by the list of inputs that were skipped, shortened or
//! rebased against a fallback date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// How much a condition degrades the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected degradation, e.g. a short history at the start of a series
    Info,
    /// Data was dropped or silently substituted
    Warning,
}

/// Why composite rows were removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No pillar had a value
    NoPillars,
    /// None of the core pillars had a value
    NoCorePillar,
    /// Every present pillar carries zero weight
    ZeroWeight,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPillars => write!(f, "no pillar present"),
            Self::NoCorePillar => write!(f, "no core pillar present"),
            Self::ZeroWeight => write!(f, "present pillars carry zero weight"),
        }
    }
}

/// A degraded-data condition absorbed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// The source produced nothing for a requested identifier
    SourceUnavailable {
        /// Requested identifier
        series: String,
        /// Reason reported by the source
        reason: String,
    },
    /// A source returned a series with no observations
    EmptySeries {
        /// Series identifier
        series: String,
    },
    /// A series had no value at all; its normalized output is all missing
    AllMissing {
        /// Series name
        series: String,
    },
    /// Fewer observations than the percentile window
    InsufficientHistory {
        /// Series name
        series: String,
        /// Non-missing observations available
        observations: usize,
        /// Configured window
        window: usize,
        /// Minimum observations before a rank is emitted
        min_periods: usize,
    },
    /// The requested rebase date had no value and the first valid one was used
    BaselineFallback {
        /// Series name
        series: String,
        /// Requested baseline date
        requested: NaiveDate,
        /// Month actually used
        used: NaiveDate,
        /// Baseline value actually used
        value: f64,
    },
    /// No usable rebase baseline; the component is all missing
    InvalidBaseline {
        /// Series name
        series: String,
        /// What was wrong with the baseline
        reason: String,
    },
    /// No component matched the pillar's naming convention, every column was used
    SelectorFallback {
        /// Pillar name
        pillar: String,
        /// Columns that ended up feeding the pillar
        columns: Vec<String>,
    },
    /// A pillar could not be produced
    PillarUnavailable {
        /// Pillar name
        pillar: String,
        /// Why the pillar is absent
        reason: String,
    },
    /// Composite rows were dropped
    RowsDropped {
        /// Drop rule that fired
        reason: DropReason,
        /// Number of rows removed
        count: usize,
    },
}

impl Condition {
    /// Severity of the condition.
    pub const fn severity(&self) -> Severity {
        match self {
            Self::InsufficientHistory { .. } | Self::RowsDropped { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Series or pillar the condition refers to, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::SourceUnavailable { series, .. }
            | Self::EmptySeries { series }
            | Self::AllMissing { series }
            | Self::InsufficientHistory { series, .. }
            | Self::BaselineFallback { series, .. }
            | Self::InvalidBaseline { series, .. } => Some(series.as_str()),
            Self::SelectorFallback { pillar, .. } | Self::PillarUnavailable { pillar, .. } => {
                Some(pillar.as_str())
            }
            Self::RowsDropped { .. } => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable { series, reason } => {
                write!(f, "{series}: source unavailable ({reason})")
            }
            Self::EmptySeries { series } => write!(f, "{series}: source returned no observations"),
            Self::AllMissing { series } => write!(f, "{series}: every value missing"),
            Self::InsufficientHistory {
                series,
                observations,
                window,
                min_periods,
            } => write!(
                f,
                "{series}: {observations} observations < window {window} \
                 (ranks start after {min_periods})"
            ),
            Self::BaselineFallback {
                series,
                requested,
                used,
                value,
            } => write!(
                f,
                "{series}: no value at {requested}, rebased on first valid {used} ({value:.3})"
            ),
            Self::InvalidBaseline { series, reason } => {
                write!(f, "{series}: invalid baseline ({reason})")
            }
            Self::SelectorFallback { pillar, columns } => write!(
                f,
                "{pillar}: no column matched naming convention, using all columns [{}]",
                columns.join(", ")
            ),
            Self::PillarUnavailable { pillar, reason } => {
                write!(f, "{pillar}: pillar unavailable ({reason})")
            }
            Self::RowsDropped { reason, count } => {
                write!(f, "composite: dropped {count} rows ({reason})")
            }
        }
    }
}

/// Ordered record of every condition absorbed during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<Condition>,
}

impl AuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a condition and emit it as a tracing event.
    pub fn record(&mut self, condition: Condition) {
        match condition.severity() {
            Severity::Info => info!(target: "aibps::audit", "{condition}"),
            Severity::Warning => warn!(target: "aibps::audit", "{condition}"),
        }
        self.entries.push(condition);
    }

    /// All recorded conditions in order.
    pub fn entries(&self) -> &[Condition] {
        &self.entries
    }

    /// Iterate recorded conditions.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.entries.iter()
    }

    /// Conditions concerning a given series or pillar.
    pub fn for_subject<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a Condition> {
        self.entries
            .iter()
            .filter(move |c| c.subject() == Some(subject))
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|c| c.severity() == Severity::Warning)
            .count()
    }

    /// Number of recorded conditions.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the entries of another log without re-emitting them.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl<'a> IntoIterator for &'a AuditLog {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_filter() {
        let mut log = AuditLog::new();
        log.record(Condition::SourceUnavailable {
            series: "QQQ".to_string(),
            reason: "not found".to_string(),
        });
        log.record(Condition::RowsDropped {
            reason: DropReason::NoCorePillar,
            count: 2,
        });

        assert_eq!(log.len(), 2);
        assert_eq!(log.warning_count(), 1);
        assert_eq!(log.for_subject("QQQ").count(), 1);
        assert_eq!(log.for_subject("SOXX").count(), 0);
    }

    #[test]
    fn test_condition_display() {
        let c = Condition::BaselineFallback {
            series: "PNFI".to_string(),
            requested: NaiveDate::from_ymd_opt(2015, 12, 31).unwrap(),
            used: NaiveDate::from_ymd_opt(2017, 3, 31).unwrap(),
            value: 12.5,
        };
        let text = c.to_string();
        assert!(text.contains("PNFI"));
        assert!(text.contains("2015-12-31"));
        assert!(text.contains("2017-03-31"));
    }
}
