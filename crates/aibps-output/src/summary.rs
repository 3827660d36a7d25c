//! Run summary: the latest reading and the audit trail.
//!
//! A summary is produced for every run, including one that could not build a
//! composite, so that skipped inputs and fallbacks are always reported.

use aibps_core::{AuditLog, CompositeIndex, Condition, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One pillar on the latest composite row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarReading {
    /// Pillar name.
    pub pillar: String,

    /// Pillar score, `None` when missing on that row.
    pub value: Option<f64>,

    /// Renormalized weight applied on that row.
    pub weight: f64,
}

/// The most recent composite row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReading {
    /// Month end of the row.
    pub date: NaiveDate,

    /// Composite score.
    pub composite: f64,

    /// Smoothed composite score.
    pub smoothed: f64,

    /// Pillar values and weights.
    pub pillars: Vec<PillarReading>,
}

/// Summary of one index run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run label.
    pub name: String,

    /// First reported month.
    pub period_start: Option<NaiveDate>,

    /// Last reported month.
    pub period_end: Option<NaiveDate>,

    /// Number of composite rows.
    pub rows: usize,

    /// Latest row, absent when no composite was built.
    pub latest: Option<LatestReading>,

    /// Every condition recorded during the run.
    pub conditions: Vec<Condition>,
}

impl RunSummary {
    /// Summarize a successful run.
    pub fn new(name: impl Into<String>, index: &CompositeIndex, audit: &AuditLog) -> Self {
        let latest = index.latest().and_then(|row| {
            let weights = index.applied_weights(row)?;
            let pillars = index
                .pillar_kinds()
                .map(|kind| PillarReading {
                    pillar: kind.to_string(),
                    value: index.pillar(kind).and_then(|values| values[row]),
                    weight: weights.get(&kind).copied().unwrap_or(0.0),
                })
                .collect();
            Some(LatestReading {
                date: index.dates()[row],
                composite: index.composite()[row],
                smoothed: index.smoothed()[row],
                pillars,
            })
        });

        Self {
            name: name.into(),
            period_start: index.dates().first().copied(),
            period_end: index.dates().last().copied(),
            rows: index.len(),
            latest,
            conditions: audit.entries().to_vec(),
        }
    }

    /// Summarize a run that produced no composite.
    pub fn without_index(name: impl Into<String>, audit: &AuditLog) -> Self {
        Self {
            name: name.into(),
            period_start: None,
            period_end: None,
            rows: 0,
            latest: None,
            conditions: audit.entries().to_vec(),
        }
    }

    /// Number of warning-level conditions.
    pub fn warning_count(&self) -> usize {
        self.conditions
            .iter()
            .filter(|c| c.severity() == Severity::Warning)
            .count()
    }

    fn period(&self) -> String {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "no composite".to_string(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nAIBPS Run: {}\n", self.name));
        output.push_str(&format!("Period: {} ({} rows)\n", self.period(), self.rows));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        if let Some(latest) = &self.latest {
            output.push_str(&format!("\nLatest Reading ({}):\n", latest.date));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!("  AIBPS:                    {:.2}\n", latest.composite));
            output.push_str(&format!("  AIBPS_RA:                 {:.2}\n", latest.smoothed));
            output.push('\n');
            output.push_str(&format!("{:<20} {:>12} {:>12}\n", "Pillar", "Value", "Weight"));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for pillar in &latest.pillars {
                let value = pillar
                    .value
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
                output.push_str(&format!(
                    "{:<20} {:>12} {:>11.1}%\n",
                    pillar.pillar,
                    value,
                    pillar.weight * 100.0
                ));
            }
        }

        output.push_str(&format!(
            "\nConditions ({}, {} warnings):\n",
            self.conditions.len(),
            self.warning_count()
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');
        if self.conditions.is_empty() {
            output.push_str("  none\n");
        }
        for condition in &self.conditions {
            output.push_str(&format!("  [{}] {condition}\n", severity_label(condition)));
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# AIBPS Run: {}\n\n", self.name));
        output.push_str(&format!(
            "**Period:** {} ({} rows)\n\n",
            self.period(),
            self.rows
        ));

        if let Some(latest) = &self.latest {
            output.push_str(&format!("## Latest Reading ({})\n\n", latest.date));
            output.push_str(&format!("- **AIBPS:** {:.2}\n", latest.composite));
            output.push_str(&format!("- **AIBPS_RA:** {:.2}\n\n", latest.smoothed));
            output.push_str("| Pillar | Value | Weight |\n");
            output.push_str("|--------|-------|--------|\n");
            for pillar in &latest.pillars {
                let value = pillar
                    .value
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
                output.push_str(&format!(
                    "| {} | {} | {:.1}% |\n",
                    pillar.pillar,
                    value,
                    pillar.weight * 100.0
                ));
            }
            output.push('\n');
        }

        output.push_str("## Conditions\n\n");
        if self.conditions.is_empty() {
            output.push_str("None recorded.\n");
        }
        for condition in &self.conditions {
            output.push_str(&format!("- **{}** {condition}\n", severity_label(condition)));
        }

        output
    }
}

const fn severity_label(condition: &Condition) -> &'static str {
    match condition.severity() {
        Severity::Info => "info",
        Severity::Warning => "warn",
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AIBPS Run: {} ({})", self.name, self.period())?;
        if let Some(latest) = &self.latest {
            writeln!(
                f,
                "  {}: AIBPS {:.2}, AIBPS_RA {:.2}",
                latest.date, latest.composite, latest.smoothed
            )?;
        }
        writeln!(
            f,
            "  {} conditions ({} warnings)",
            self.conditions.len(),
            self.warning_count()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aibps_core::{
        CompositeBuilder, DropReason, MonthlySeries, Pillar, PillarKind,
    };

    fn index_and_audit() -> (CompositeIndex, AuditLog) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let pillars = [
            Pillar::from_series(
                PillarKind::Market,
                MonthlySeries::from_values("m", start, vec![Some(60.0), Some(70.0), None]),
            ),
            Pillar::from_series(
                PillarKind::Adoption,
                MonthlySeries::from_values("a", start, vec![Some(30.0), Some(40.0), Some(50.0)]),
            ),
        ];
        let mut audit = AuditLog::new();
        let index = CompositeBuilder::default().build(&pillars, &mut audit).unwrap();
        (index, audit)
    }

    #[test]
    fn test_latest_reading() {
        let (index, audit) = index_and_audit();
        let summary = RunSummary::new("test", &index, &audit);

        assert_eq!(summary.rows, 2);
        let latest = summary.latest.as_ref().unwrap();
        assert_eq!(latest.date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(latest.pillars.len(), 2);
        let weight_sum: f64 = latest.pillars.iter().map(|p| p.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-12);

        // the third month has no core pillar
        assert!(matches!(
            summary.conditions.as_slice(),
            [Condition::RowsDropped {
                reason: DropReason::NoCorePillar,
                count: 1
            }]
        ));
    }

    #[test]
    fn test_renderings() {
        let (index, audit) = index_and_audit();
        let summary = RunSummary::new("test", &index, &audit);

        let ascii = summary.to_ascii_table();
        assert!(ascii.contains("AIBPS Run: test"));
        assert!(ascii.contains("Adoption"));
        assert!(ascii.contains("no core pillar present"));

        let markdown = summary.to_markdown();
        assert!(markdown.contains("# AIBPS Run: test"));
        assert!(markdown.contains("| Pillar | Value | Weight |"));

        assert!(summary.to_string().contains("1 conditions"));
    }

    #[test]
    fn test_failed_run_summary() {
        let mut audit = AuditLog::new();
        audit.record(Condition::SourceUnavailable {
            series: "SOXX".to_string(),
            reason: "no file".to_string(),
        });
        let summary = RunSummary::without_index("empty", &audit);

        assert!(summary.latest.is_none());
        assert_eq!(summary.warning_count(), 1);
        assert!(summary.to_ascii_table().contains("no composite"));
        assert!(summary.to_markdown().contains("SOXX"));
    }
}
