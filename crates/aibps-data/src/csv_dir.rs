//! CSV directory source
//!
//! Each identifier lives in its own `<id>.csv` file with a header row. The date
//! column is found by name (`date`, `observation_date`, ...) or taken to be the
//! first column; the value column is the one named after the identifier, else
//! one named `value`, else the first non-date column. Lines starting with `#`
//! are comments.

use crate::error::{DataError, Result};
use crate::parse::{parse_date, parse_value};
use crate::source::SeriesSource;
use aibps_core::{Observation, TimeSeries};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const DATE_HEADERS: &[&str] = &["date", "observation_date", "month", "week", "time", "timestamp"];

/// Reads one CSV file per identifier from a directory.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    /// Source over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.csv"))
    }
}

impl SeriesSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, id: &str) -> Result<TimeSeries> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(DataError::missing(
                id,
                format!("no file at {}", path.display()),
            ));
        }
        let file = std::fs::File::open(&path)?;
        let series = read_series(id, file)?;
        debug!(
            id,
            path = %path.display(),
            observations = series.len(),
            "read csv series"
        );
        Ok(series)
    }

    fn identifiers(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Read a single series for `id` from CSV text.
pub fn read_series<R: Read>(id: &str, reader: R) -> Result<TimeSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(DataError::InvalidSeries(format!(
            "{id}: expected a date column and a value column, found {} column(s)",
            headers.len()
        )));
    }

    let date_col = headers
        .iter()
        .position(|h| DATE_HEADERS.iter().any(|d| h.eq_ignore_ascii_case(d)))
        .unwrap_or(0);
    let value_col = headers
        .iter()
        .position(|h| h == id)
        .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case("value")))
        .or_else(|| (0..headers.len()).find(|&i| i != date_col))
        .ok_or_else(|| DataError::InvalidSeries(format!("{id}: no value column")))?;

    let mut observations = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let Some(raw_date) = record.get(date_col).filter(|d| !d.is_empty()) else {
            continue;
        };
        let date = parse_date(raw_date)
            .map_err(|e| DataError::Parse(format!("{id}, data row {}: {e}", line + 1)))?;
        let value = record.get(value_col).and_then(parse_value);
        observations.push(Observation::new(date, value));
    }

    Ok(TimeSeries::new(id, observations))
}
