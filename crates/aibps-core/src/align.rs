//! Grid Aligner
//!
//! Snaps an irregular raw series onto the month-end grid. Sources finer than
//! monthly are sampled at the last observation at or before each month end
//! (carried forward through empty months) or averaged within the month;
//! sources coarser than monthly are either forward-filled across their period
//! or linearly interpolated between consecutive observations.

use crate::series::{MonthGrid, MonthlySeries, TimeSeries};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Native sampling frequency of a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Business or calendar daily data
    Daily,
    /// Weekly data
    Weekly,
    /// One observation per month
    Monthly,
    /// One observation per quarter
    Quarterly,
    /// One observation per year
    Annual,
}

impl Frequency {
    /// Number of months one observation stands for.
    pub const fn period_months(self) -> usize {
        match self {
            Self::Daily | Self::Weekly | Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annual => 12,
        }
    }

    /// Whether the frequency is coarser than the monthly grid.
    pub const fn is_coarse(self) -> bool {
        self.period_months() > 1
    }

    /// Policy used when an input does not choose one explicitly.
    ///
    /// Levels and rates sampled coarser than monthly are interpolated.
    pub const fn default_policy(self) -> AlignPolicy {
        if self.is_coarse() {
            AlignPolicy::Interpolate
        } else {
            AlignPolicy::Last
        }
    }
}

/// How observations are mapped onto month-end slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignPolicy {
    /// Last observation at or before each month end, carried forward
    Last,
    /// Arithmetic mean of the observations inside each month
    Mean,
    /// Coarse value repeated across every month of its period
    ForwardFill,
    /// Linear interpolation between consecutive coarse observations
    Interpolate,
}

/// Per-input alignment settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignSpec {
    /// Native frequency of the input
    pub frequency: Frequency,
    /// Explicit policy; `None` uses [`Frequency::default_policy`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<AlignPolicy>,
}

impl AlignSpec {
    /// Spec using the frequency's default policy.
    pub const fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            policy: None,
        }
    }

    /// Spec with an explicit policy.
    pub const fn with_policy(frequency: Frequency, policy: AlignPolicy) -> Self {
        Self {
            frequency,
            policy: Some(policy),
        }
    }

    /// Policy that will actually be applied.
    pub const fn resolved_policy(&self) -> AlignPolicy {
        match self.policy {
            Some(policy) => policy,
            None => self.frequency.default_policy(),
        }
    }

    /// Align `series` with these settings.
    pub fn align(&self, series: &TimeSeries) -> MonthlySeries {
        align(series, self.frequency, self.resolved_policy())
    }
}

/// Align a raw series onto the month-end grid spanning its observations.
///
/// An empty input yields an empty series. When several observations fall in
/// the same month the chronologically later one fills the slot (for
/// [`AlignPolicy::Mean`] they are averaged instead).
pub fn align(series: &TimeSeries, frequency: Frequency, policy: AlignPolicy) -> MonthlySeries {
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        debug!(series = series.name(), "empty input, nothing to align");
        return MonthlySeries::empty(series.name());
    };

    let mut grid = MonthGrid::new(first, last);
    if policy == AlignPolicy::ForwardFill {
        // The last coarse value covers the rest of its period
        grid = grid.extended(frequency.period_months() - 1);
    }

    let values = match policy {
        AlignPolicy::Last | AlignPolicy::ForwardFill => {
            carry_forward(place_last(series, &grid))
        }
        AlignPolicy::Mean => place_mean(series, &grid),
        AlignPolicy::Interpolate => interpolate(place_last(series, &grid)),
    };

    debug!(
        series = series.name(),
        ?frequency,
        ?policy,
        months = grid.len(),
        "aligned to month-end grid"
    );
    MonthlySeries::new(series.name(), grid, values)
}

/// Later observations overwrite earlier ones within a month.
fn place_last(series: &TimeSeries, grid: &MonthGrid) -> Vec<Option<f64>> {
    let mut slots = vec![None; grid.len()];
    for obs in series.observations() {
        if let (Some(value), Some(i)) = (obs.value, grid.position(obs.date)) {
            slots[i] = Some(value);
        }
    }
    slots
}

fn place_mean(series: &TimeSeries, grid: &MonthGrid) -> Vec<Option<f64>> {
    let mut sums = vec![(0.0_f64, 0_usize); grid.len()];
    for obs in series.observations() {
        if let (Some(value), Some(i)) = (obs.value, grid.position(obs.date)) {
            sums[i].0 += value;
            sums[i].1 += 1;
        }
    }
    sums.into_iter()
        .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
        .collect()
}

fn carry_forward(mut slots: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let mut last = None;
    for slot in &mut slots {
        if slot.is_some() {
            last = *slot;
        } else {
            *slot = last;
        }
    }
    slots
}

/// Fill interior gaps linearly by slot distance; leading and trailing gaps stay missing.
fn interpolate(mut slots: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    for pair in known.windows(2) {
        let (i0, v0) = pair[0];
        let (i1, v1) = pair[1];
        let span = (i1 - i0) as f64;
        for (step, slot) in slots[i0 + 1..i1].iter_mut().enumerate() {
            let t = (step + 1) as f64 / span;
            *slot = Some(v0 + (v1 - v0) * t);
        }
    }
    slots
}
