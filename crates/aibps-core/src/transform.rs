//! Transforms applied to aligned series before normalization
//!
//! Percent change turns price levels into returns (12 periods on a monthly
//! grid is a year-over-year change), the rolling mean smooths noisy growth
//! rates and the composite, and [`sum`] combines raw spending series that
//! only make sense in total.

use crate::series::{MonthGrid, MonthlySeries};
use polars::prelude::{
    DataFrame, Expr, IntoLazy, NamedFrom, PolarsResult, RollingOptionsFixedWindow, Series, col,
    lit,
};
use serde::{Deserialize, Serialize};

/// Column holding slot values in the frames built here.
pub(crate) const VALUE: &str = "value";

/// A transform step in an input recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Percent change over `periods` months, times 100
    PctChange {
        /// Lag in months
        periods: usize,
    },
    /// Trailing mean over `window` months, partial windows allowed
    RollingMean {
        /// Window length in months
        window: usize,
    },
}

impl Transform {
    /// Year-over-year percent change on a monthly grid.
    pub const YOY: Self = Self::PctChange { periods: 12 };

    /// Apply the transform, keeping the series name and grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying polars computation fails.
    pub fn apply(&self, series: &MonthlySeries) -> PolarsResult<MonthlySeries> {
        match *self {
            Self::PctChange { periods } => pct_change(series, periods),
            Self::RollingMean { window } => rolling_mean(series, window, 1),
        }
    }
}

/// `(v[t] / v[t - periods] - 1) * 100`.
///
/// Missing when either end is missing or the base is zero.
///
/// # Errors
///
/// Returns an error if the underlying polars computation fails.
pub fn pct_change(series: &MonthlySeries, periods: usize) -> PolarsResult<MonthlySeries> {
    let change = (col(VALUE) / col(VALUE).shift(lit(periods as i64)) - lit(1.0)) * lit(100.0);
    let changes = evaluate(series.values(), change)?
        .into_iter()
        // a zero base divides to inf or NaN
        .map(|v| v.filter(|v| v.is_finite()))
        .collect();
    Ok(MonthlySeries::new(series.name(), *series.grid(), changes))
}

/// Trailing mean over the last `window` slots of a series.
///
/// # Errors
///
/// Returns an error if the underlying polars computation fails.
pub fn rolling_mean(
    series: &MonthlySeries,
    window: usize,
    min_periods: usize,
) -> PolarsResult<MonthlySeries> {
    Ok(MonthlySeries::new(
        series.name(),
        *series.grid(),
        rolling_mean_values(series.values(), window, min_periods)?,
    ))
}

/// Trailing mean over raw slot values.
///
/// A slot gets a value when at least `min_periods` of the last `window` slots
/// (itself included) are present; missing slots are skipped, not counted as zero.
///
/// # Errors
///
/// Returns an error if the underlying polars computation fails.
pub fn rolling_mean_values(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
) -> PolarsResult<Vec<Option<f64>>> {
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    if min_periods > window {
        return Ok(vec![None; values.len()]);
    }
    evaluate(
        values,
        col(VALUE).rolling_mean(RollingOptionsFixedWindow {
            window_size: window,
            min_periods,
            ..Default::default()
        }),
    )
}

/// Evaluate `expr` over a single-column frame of `values`.
///
/// `expr` reads the `value` column and must keep its length.
pub(crate) fn evaluate(values: &[Option<f64>], expr: Expr) -> PolarsResult<Vec<Option<f64>>> {
    let frame = DataFrame::new(vec![Series::new(VALUE.into(), values).into()])?;
    let out = frame.lazy().select([expr.alias(VALUE)]).collect()?;
    Ok(out.column(VALUE)?.f64()?.into_iter().collect())
}

/// Row-wise sum of components on their union grid.
///
/// A slot is present when at least one component has a value there.
pub fn sum(name: impl Into<String>, components: &[&MonthlySeries]) -> MonthlySeries {
    reduce_rows(name, components, |values| values.iter().sum())
}

/// Row-wise reduction over the union grid of `components`, skipping missing values.
pub(crate) fn reduce_rows(
    name: impl Into<String>,
    components: &[&MonthlySeries],
    reduce: impl Fn(&[f64]) -> f64,
) -> MonthlySeries {
    let grid = components
        .iter()
        .fold(MonthGrid::empty(), |acc, s| acc.union(s.grid()));
    let mut row = Vec::with_capacity(components.len());
    let values = grid
        .dates()
        .map(|date| {
            row.clear();
            row.extend(components.iter().filter_map(|s| s.get(date)));
            (!row.is_empty()).then(|| reduce(&row))
        })
        .collect();
    MonthlySeries::new(name, grid, values)
}
