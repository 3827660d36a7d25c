//! The series source seam

use crate::error::{DataError, Result};
use aibps_core::TimeSeries;
use std::collections::BTreeMap;

/// Anything that can hand out raw series by identifier.
///
/// A source either returns the series it has (possibly empty) or an error;
/// the pipeline turns errors into audit conditions and carries on.
pub trait SeriesSource {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Raw series for `id`.
    fn fetch(&self, id: &str) -> Result<TimeSeries>;

    /// Identifiers the source can serve.
    fn identifiers(&self) -> Result<Vec<String>>;
}

impl<S: SeriesSource + ?Sized> SeriesSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, id: &str) -> Result<TimeSeries> {
        (**self).fetch(id)
    }

    fn identifiers(&self) -> Result<Vec<String>> {
        (**self).identifiers()
    }
}

/// Series held in memory, keyed by their name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: BTreeMap<String, TimeSeries>,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series, replacing one with the same name.
    pub fn insert(&mut self, series: TimeSeries) {
        self.series.insert(series.name().to_string(), series);
    }

    /// Builder-style [`Self::insert`].
    pub fn with(mut self, series: TimeSeries) -> Self {
        self.insert(series);
        self
    }

    /// Number of series held.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the source holds nothing.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<TimeSeries> for InMemorySource {
    fn from_iter<I: IntoIterator<Item = TimeSeries>>(iter: I) -> Self {
        Self {
            series: iter
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
        }
    }
}

impl SeriesSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, id: &str) -> Result<TimeSeries> {
        self.series
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::missing(id, "not held in memory"))
    }

    fn identifiers(&self) -> Result<Vec<String>> {
        Ok(self.series.keys().cloned().collect())
    }
}
