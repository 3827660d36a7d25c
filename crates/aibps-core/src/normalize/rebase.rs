//! Rebase to 100 at a baseline month

use super::Normalizer;
use crate::audit::{AuditLog, Condition};
use crate::series::MonthlySeries;
use chrono::NaiveDate;
use polars::prelude::PolarsResult;
use tracing::debug;

/// Linear rescaling so that the baseline month equals exactly 100.
///
/// When the series has no value in the baseline month, the first valid
/// observation is used instead and the substitution is recorded. A zero or
/// absent baseline yields an all-missing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebase {
    baseline: NaiveDate,
}

impl Rebase {
    /// Rebase on the month containing `baseline`.
    pub const fn new(baseline: NaiveDate) -> Self {
        Self { baseline }
    }

    /// Requested baseline date.
    pub const fn baseline(&self) -> NaiveDate {
        self.baseline
    }

    /// Rescale `series`, recording a fallback or an unusable baseline in `audit`.
    pub fn rebase(&self, series: &MonthlySeries, audit: &mut AuditLog) -> MonthlySeries {
        let name = series.name();
        let missing = || MonthlySeries::missing(name, *series.grid());

        if series.is_all_missing() {
            audit.record(Condition::AllMissing {
                series: name.to_string(),
            });
            return missing();
        }

        let base = match series.get(self.baseline) {
            Some(value) => value,
            None => {
                let Some((used, value)) = series.first_valid() else {
                    return missing();
                };
                audit.record(Condition::BaselineFallback {
                    series: name.to_string(),
                    requested: self.baseline,
                    used,
                    value,
                });
                value
            }
        };

        if base == 0.0 {
            audit.record(Condition::InvalidBaseline {
                series: name.to_string(),
                reason: "baseline value is zero".to_string(),
            });
            return missing();
        }

        debug!(series = name, base, "rebased to 100");
        series.map_values(name, |v| v / base * 100.0)
    }
}

impl Normalizer for Rebase {
    fn name(&self) -> &str {
        "rebase"
    }

    fn normalize(
        &self,
        series: &MonthlySeries,
        audit: &mut AuditLog,
    ) -> PolarsResult<MonthlySeries> {
        Ok(self.rebase(series, audit))
    }
}

/// Rebase `series` on `baseline`, discarding the audit trail.
pub fn rebase_100(series: &MonthlySeries, baseline: NaiveDate) -> MonthlySeries {
    Rebase::new(baseline).rebase(series, &mut AuditLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_baseline_month_is_exactly_100() {
        let s = MonthlySeries::from_values(
            "cloud",
            date(2015, 11, 30),
            vec![Some(40.0), Some(37.3), Some(50.0)],
        );
        let mut audit = AuditLog::new();
        let r = Rebase::new(date(2015, 12, 31)).rebase(&s, &mut audit);

        assert_eq!(r.get(date(2015, 12, 31)), Some(100.0));
        assert_relative_eq!(r.values()[2].unwrap(), 50.0 / 37.3 * 100.0);
        assert!(audit.is_empty());
    }

    #[test]
    fn test_baseline_matches_by_month() {
        let s = MonthlySeries::from_values("x", date(2015, 12, 31), vec![Some(8.0)]);
        // mid-month baseline still resolves to the December slot
        let r = rebase_100(&s, date(2015, 12, 15));
        assert_eq!(r.values(), &[Some(100.0)]);
    }

    #[test]
    fn test_missing_baseline_falls_back_to_first_valid() {
        let s = MonthlySeries::from_values(
            "late",
            date(2017, 1, 31),
            vec![None, Some(20.0), Some(30.0)],
        );
        let mut audit = AuditLog::new();
        let r = Rebase::new(date(2015, 12, 31)).rebase(&s, &mut audit);

        assert_eq!(r.values(), &[None, Some(100.0), Some(150.0)]);
        assert!(matches!(
            audit.entries(),
            [Condition::BaselineFallback { used, value, .. }]
                if *used == date(2017, 2, 28) && *value == 20.0
        ));
    }

    #[test]
    fn test_zero_baseline_yields_all_missing() {
        let s = MonthlySeries::from_values(
            "zero",
            date(2015, 12, 31),
            vec![Some(0.0), Some(5.0)],
        );
        let mut audit = AuditLog::new();
        let r = Rebase::new(date(2015, 12, 31)).rebase(&s, &mut audit);

        assert!(r.is_all_missing());
        assert_eq!(r.len(), 2);
        assert!(matches!(
            audit.entries(),
            [Condition::InvalidBaseline { .. }]
        ));
    }

    #[test]
    fn test_normalizer_matches_rebase() {
        let s = MonthlySeries::from_values("x", date(2015, 12, 31), vec![Some(4.0), Some(5.0)]);
        let rebase = Rebase::new(date(2015, 12, 31));
        let via_trait = rebase.normalize(&s, &mut AuditLog::new()).unwrap();
        assert_eq!(via_trait, rebase.rebase(&s, &mut AuditLog::new()));
        assert_eq!(via_trait.values(), &[Some(100.0), Some(125.0)]);
    }

    #[test]
    fn test_all_missing_input() {
        let s = MonthlySeries::from_values("none", date(2015, 12, 31), vec![None, None]);
        let mut audit = AuditLog::new();
        let r = Rebase::new(date(2015, 12, 31)).rebase(&s, &mut audit);
        assert!(r.is_all_missing());
        assert_eq!(audit.for_subject("none").count(), 1);
    }
}
