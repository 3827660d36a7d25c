//! Time series data model
//!
//! Raw inputs arrive as [`TimeSeries`]: irregular, possibly unsorted
//! observations with gaps. Everything downstream of the aligner works on
//! [`MonthlySeries`], which carries exactly one (possibly missing) value per
//! calendar month on a contiguous [`MonthGrid`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation timestamp
    pub date: NaiveDate,
    /// Observed value, `None` when missing
    pub value: Option<f64>,
}

impl Observation {
    /// Create a new observation. Non-finite values are stored as missing.
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            date,
            value: value.filter(|v| v.is_finite()),
        }
    }
}

/// A named raw series with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    name: String,
    observations: Vec<Observation>,
}

impl TimeSeries {
    /// Build a series from observations in any order.
    ///
    /// Observations are sorted by date; when a date appears more than once the
    /// observation supplied last wins, so timestamps end up strictly increasing.
    pub fn new(name: impl Into<String>, observations: Vec<Observation>) -> Self {
        let mut observations: Vec<Observation> = observations
            .into_iter()
            .map(|o| Observation::new(o.date, o.value))
            .collect();
        // Stable sort keeps supply order within a date
        observations.sort_by_key(|o| o.date);

        let mut deduped: Vec<Observation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.date == obs.date => *last = obs,
                _ => deduped.push(obs),
            }
        }

        Self {
            name: name.into(),
            observations: deduped,
        }
    }

    /// Build a series from `(date, value)` pairs.
    pub fn from_pairs(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        Self::new(
            name,
            pairs
                .into_iter()
                .map(|(date, value)| Observation::new(date, Some(value)))
                .collect(),
        )
    }

    /// An empty series.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observations: Vec::new(),
        }
    }

    /// Series identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observations in chronological order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations, missing ones included.
    pub const fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations at all.
    pub const fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Whether every observation is missing (true for an empty series).
    pub fn is_all_missing(&self) -> bool {
        self.observations.iter().all(|o| o.value.is_none())
    }

    /// Date of the first observation.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    /// Date of the last observation.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Return a copy of the series under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observations: self.observations.clone(),
        }
    }
}

/// Months since year 0, used as the grid coordinate.
pub(crate) fn month_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn month_end_from_ordinal(ordinal: i64) -> NaiveDate {
    let next = ordinal + 1;
    let year = i32::try_from(next.div_euclid(12)).unwrap_or(i32::MAX);
    let month = u32::try_from(next.rem_euclid(12)).unwrap_or(0) + 1;
    // Only unreachable at the edge of chrono's supported range
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// The last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    month_end_from_ordinal(month_ordinal(date))
}

/// A contiguous run of calendar months, each dated at its month end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonthGrid {
    first: i64,
    len: usize,
}

impl MonthGrid {
    /// Grid covering every month from `start` to `end` inclusive.
    ///
    /// Returns an empty grid when `end` falls in a month before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        let first = month_ordinal(start);
        let last = month_ordinal(end);
        if last < first {
            return Self::empty();
        }
        Self {
            first,
            len: usize::try_from(last - first + 1).unwrap_or(0),
        }
    }

    /// Grid starting at the month of `start` with `len` months.
    pub fn with_len(start: NaiveDate, len: usize) -> Self {
        Self {
            first: month_ordinal(start),
            len,
        }
    }

    /// A grid with no months.
    pub const fn empty() -> Self {
        Self { first: 0, len: 0 }
    }

    /// Number of months on the grid.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the grid has no months.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First month end, if any.
    pub fn start(&self) -> Option<NaiveDate> {
        (!self.is_empty()).then(|| month_end_from_ordinal(self.first))
    }

    /// Last month end, if any.
    pub fn end(&self) -> Option<NaiveDate> {
        (!self.is_empty()).then(|| month_end_from_ordinal(self.last_ordinal()))
    }

    /// Month end of slot `index`.
    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        (index < self.len).then(|| month_end_from_ordinal(self.first + index as i64))
    }

    /// Slot holding the month that contains `date`.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        let offset = month_ordinal(date) - self.first;
        usize::try_from(offset).ok().filter(|&i| i < self.len)
    }

    /// Iterate the month ends of the grid.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.len).map(move |i| month_end_from_ordinal(self.first + i as i64))
    }

    /// Smallest grid covering both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let first = self.first.min(other.first);
        let last = self.last_ordinal().max(other.last_ordinal());
        Self {
            first,
            len: usize::try_from(last - first + 1).unwrap_or(0),
        }
    }

    /// Extend the grid by `months` at the end.
    pub const fn extended(&self, months: usize) -> Self {
        Self {
            first: self.first,
            len: self.len + months,
        }
    }

    const fn last_ordinal(&self) -> i64 {
        self.first + self.len as i64 - 1
    }
}

/// A named series with one slot per month on a [`MonthGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    name: String,
    grid: MonthGrid,
    values: Vec<Option<f64>>,
}

/// Output of the grid aligner.
pub type AlignedSeries = MonthlySeries;

/// Output of a normalizer: percentile scores or a rebased index.
pub type NormalizedSeries = MonthlySeries;

impl MonthlySeries {
    /// Create a series on `grid`.
    ///
    /// `values` is truncated or padded with missing slots to the grid length;
    /// non-finite values are stored as missing.
    pub fn new(name: impl Into<String>, grid: MonthGrid, values: Vec<Option<f64>>) -> Self {
        let mut values: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        values.resize(grid.len(), None);
        Self {
            name: name.into(),
            grid,
            values,
        }
    }

    /// Series of consecutive months starting at the month of `start`.
    pub fn from_values(
        name: impl Into<String>,
        start: NaiveDate,
        values: Vec<Option<f64>>,
    ) -> Self {
        let grid = MonthGrid::with_len(start, values.len());
        Self::new(name, grid, values)
    }

    /// A series with no months.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grid: MonthGrid::empty(),
            values: Vec::new(),
        }
    }

    /// An all-missing series on `grid`.
    pub fn missing(name: impl Into<String>, grid: MonthGrid) -> Self {
        Self {
            name: name.into(),
            grid,
            values: vec![None; grid.len()],
        }
    }

    /// Series name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Month grid of the series.
    pub const fn grid(&self) -> &MonthGrid {
        &self.grid
    }

    /// Slot values in grid order.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of slots.
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no slots.
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value in the month containing `date`.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.grid.position(date).and_then(|i| self.values[i])
    }

    /// Iterate `(month_end, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.grid.dates().zip(self.values.iter().copied())
    }

    /// Number of non-missing slots.
    pub fn observation_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Whether every slot is missing (true for an empty series).
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// First non-missing slot as `(month_end, value)`.
    pub fn first_valid(&self) -> Option<(NaiveDate, f64)> {
        self.iter().find_map(|(d, v)| v.map(|v| (d, v)))
    }

    /// Last non-missing slot as `(month_end, value)`.
    pub fn last_valid(&self) -> Option<(NaiveDate, f64)> {
        self.values
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, v)| v.and_then(|v| self.grid.date(i).map(|d| (d, v))))
    }

    /// Copy of the series under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grid: self.grid,
            values: self.values.clone(),
        }
    }

    /// Same grid, values replaced by `f` applied to each present value.
    pub fn map_values(&self, name: impl Into<String>, f: impl Fn(f64) -> f64) -> Self {
        Self::new(
            name,
            self.grid,
            self.values.iter().map(|v| v.map(&f)).collect(),
        )
    }

    /// Place the series on another grid; slots outside the original span are missing.
    pub fn reindex(&self, grid: &MonthGrid) -> Self {
        let values = grid
            .dates()
            .map(|date| self.grid.position(date).and_then(|i| self.values[i]))
            .collect();
        Self {
            name: self.name.clone(),
            grid: *grid,
            values,
        }
    }

    /// Convert back to a raw series, dropping missing slots.
    pub fn to_time_series(&self) -> TimeSeries {
        TimeSeries::new(
            self.name.clone(),
            self.iter()
                .filter(|(_, v)| v.is_some())
                .map(|(date, value)| Observation { date, value })
                .collect(),
        )
    }
}

/// An ordered collection of uniquely named monthly series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSet {
    series: Vec<MonthlySeries>,
}

impl SeriesSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series, replacing any existing series with the same name.
    pub fn insert(&mut self, series: MonthlySeries) {
        if let Some(existing) = self.series.iter_mut().find(|s| s.name == series.name) {
            *existing = series;
        } else {
            self.series.push(series);
        }
    }

    /// Look up a series by name.
    pub fn get(&self, name: &str) -> Option<&MonthlySeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Whether a series with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Series names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }

    /// Iterate series in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MonthlySeries> {
        self.series.iter()
    }

    /// Number of series.
    pub const fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Grid covering every series in the set.
    pub fn grid(&self) -> MonthGrid {
        self.series
            .iter()
            .fold(MonthGrid::empty(), |acc, s| acc.union(s.grid()))
    }
}

impl FromIterator<MonthlySeries> for SeriesSet {
    fn from_iter<I: IntoIterator<Item = MonthlySeries>>(iter: I) -> Self {
        let mut set = Self::new();
        for series in iter {
            set.insert(series);
        }
        set
    }
}

impl<'a> IntoIterator for &'a SeriesSet {
    type Item = &'a MonthlySeries;
    type IntoIter = std::slice::Iter<'a, MonthlySeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2024, 1, 15), date(2024, 1, 31))]
    #[case(date(2024, 2, 1), date(2024, 2, 29))]
    #[case(date(2023, 2, 28), date(2023, 2, 28))]
    #[case(date(2023, 12, 31), date(2023, 12, 31))]
    #[case(date(2023, 4, 2), date(2023, 4, 30))]
    fn test_month_end(#[case] input: NaiveDate, #[case] expected: NaiveDate) {
        assert_eq!(month_end(input), expected);
    }

    #[test]
    fn test_time_series_sorts_and_keeps_later_duplicate() {
        let series = TimeSeries::new(
            "x",
            vec![
                Observation::new(date(2024, 3, 1), Some(3.0)),
                Observation::new(date(2024, 1, 1), Some(1.0)),
                Observation::new(date(2024, 3, 1), Some(30.0)),
                Observation::new(date(2024, 2, 1), Some(f64::NAN)),
            ],
        );

        let obs = series.observations();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].date, date(2024, 1, 1));
        assert_eq!(obs[1].value, None);
        assert_eq!(obs[2].value, Some(30.0));
    }

    #[test]
    fn test_grid_spans_year_boundary() {
        let grid = MonthGrid::new(date(2023, 11, 5), date(2024, 2, 10));
        let dates: Vec<_> = grid.dates().collect();
        assert_eq!(
            dates,
            vec![
                date(2023, 11, 30),
                date(2023, 12, 31),
                date(2024, 1, 31),
                date(2024, 2, 29)
            ]
        );
        assert_eq!(grid.position(date(2024, 1, 1)), Some(2));
        assert_eq!(grid.position(date(2024, 3, 1)), None);
        assert_eq!(grid.position(date(2023, 10, 31)), None);
    }

    #[test]
    fn test_grid_union() {
        let a = MonthGrid::new(date(2020, 1, 1), date(2020, 3, 1));
        let b = MonthGrid::new(date(2020, 6, 1), date(2020, 7, 1));
        let u = a.union(&b);
        assert_eq!(u.len(), 7);
        assert_eq!(u.start(), Some(date(2020, 1, 31)));
        assert_eq!(u.end(), Some(date(2020, 7, 31)));
        assert_eq!(MonthGrid::empty().union(&b), b);
    }

    #[test]
    fn test_reindex_pads_with_missing() {
        let s = MonthlySeries::from_values("s", date(2020, 2, 29), vec![Some(1.0), Some(2.0)]);
        let grid = MonthGrid::new(date(2020, 1, 1), date(2020, 4, 1));
        let r = s.reindex(&grid);
        assert_eq!(r.values(), &[None, Some(1.0), Some(2.0), None]);
        assert_eq!(r.get(date(2020, 3, 15)), Some(2.0));
    }

    #[test]
    fn test_first_and_last_valid() {
        let s = MonthlySeries::from_values(
            "s",
            date(2020, 1, 31),
            vec![None, Some(4.0), Some(5.0), None],
        );
        assert_eq!(s.first_valid(), Some((date(2020, 2, 29), 4.0)));
        assert_eq!(s.last_valid(), Some((date(2020, 3, 31), 5.0)));
        assert_eq!(s.observation_count(), 2);
    }

    #[test]
    fn test_series_set_replaces_by_name() {
        let mut set = SeriesSet::new();
        set.insert(MonthlySeries::from_values("a", date(2020, 1, 31), vec![Some(1.0)]));
        set.insert(MonthlySeries::from_values("b", date(2020, 1, 31), vec![Some(2.0)]));
        set.insert(MonthlySeries::from_values("a", date(2020, 1, 31), vec![Some(9.0)]));

        assert_eq!(set.names(), vec!["a", "b"]);
        assert_eq!(set.get("a").unwrap().values(), &[Some(9.0)]);
    }
}
