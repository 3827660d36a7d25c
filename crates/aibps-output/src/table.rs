//! Month-end keyed tables of pillar and composite columns.

use crate::export::{ExportError, ExportFormat, Exporter};
use aibps_core::{COMPOSITE_COLUMN, CompositeIndex, Pillar, SMOOTHED_COLUMN};
use chrono::NaiveDate;
use polars::prelude::*;
use serde_json::{Map, Value};

/// Name of the date column in every table.
const DATE_COLUMN: &str = "date";

/// A table keyed by month end with one numeric column per series.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl Table {
    /// Empty table with the given name.
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            dates,
            columns: Vec::new(),
        }
    }

    /// Append a column; values beyond the row count are ignored and short
    /// columns are padded with missing values.
    pub fn push_column(&mut self, name: impl Into<String>, mut values: Vec<Option<f64>>) {
        values.resize(self.dates.len(), None);
        self.columns.push((name.into(), values));
    }

    /// The `aibps_monthly` table: pillar columns, then `AIBPS` and `AIBPS_RA`.
    pub fn from_composite(index: &CompositeIndex) -> Self {
        let mut table = Self::new("aibps_monthly", index.dates().to_vec());
        for kind in index.pillar_kinds() {
            if let Some(values) = index.pillar(kind) {
                table.push_column(kind.to_string(), values.to_vec());
            }
        }
        table.push_column(
            COMPOSITE_COLUMN,
            index.composite().iter().copied().map(Some).collect(),
        );
        table.push_column(
            SMOOTHED_COLUMN,
            index.smoothed().iter().copied().map(Some).collect(),
        );
        table
    }

    /// The `<Pillar>_processed` table: component columns, then the pillar.
    ///
    /// Months where every column is missing are left out.
    pub fn from_pillar(pillar: &Pillar) -> Self {
        let grid = *pillar.series.grid();
        let mut columns: Vec<(String, Vec<Option<f64>>)> = pillar
            .components
            .iter()
            .filter(|c| c.name() != pillar.name())
            .map(|c| (c.name().to_string(), c.reindex(&grid).values().to_vec()))
            .collect();
        columns.push((pillar.name().to_string(), pillar.series.values().to_vec()));

        let keep: Vec<usize> = (0..grid.len())
            .filter(|&row| columns.iter().any(|(_, values)| values[row].is_some()))
            .collect();

        let mut table = Self::new(
            format!("{}_processed", pillar.name()),
            keep.iter().filter_map(|&row| grid.date(row)).collect(),
        );
        for (name, values) in columns {
            table.push_column(name, keep.iter().map(|&row| values[row]).collect());
        }
        table
    }

    /// Table name, used as the file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name for `format`, e.g. `aibps_monthly.csv`.
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.name, format.extension())
    }

    /// Row dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of rows.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table has no rows.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column names in order, date column excluded.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Values of a column.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Convert to a polars `DataFrame` with a `Date` typed `date` column.
    pub fn to_frame(&self) -> Result<DataFrame, ExportError> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .ok_or_else(|| ExportError::InvalidFormat("epoch out of range".to_string()))?;
        let days: Vec<i32> = self
            .dates
            .iter()
            .map(|d| (*d - epoch).num_days() as i32)
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + 1);
        columns.push(
            Series::new(DATE_COLUMN.into(), days)
                .cast(&DataType::Date)?
                .into(),
        );
        for (name, values) in &self.columns {
            columns.push(Series::new(name.as_str().into(), values.clone()).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    fn records(&self) -> Vec<Value> {
        self.dates
            .iter()
            .enumerate()
            .map(|(row, date)| {
                let mut record = Map::new();
                record.insert(DATE_COLUMN.to_string(), Value::String(date.to_string()));
                for (name, values) in &self.columns {
                    record.insert(name.clone(), values[row].map_or(Value::Null, Value::from));
                }
                Value::Object(record)
            })
            .collect()
    }
}

impl Exporter for Table {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record(std::iter::once(DATE_COLUMN).chain(self.column_names()))?;
                for (row, date) in self.dates.iter().enumerate() {
                    let mut record = vec![date.to_string()];
                    record.extend(self.columns.iter().map(|(_, values)| {
                        values[row].map(|v| v.to_string()).unwrap_or_default()
                    }));
                    wtr.write_record(&record)?;
                }
                let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
                String::from_utf8(bytes)
                    .map_err(|e| ExportError::InvalidFormat(e.to_string()))
            }
            ExportFormat::Json => Ok(serde_json::to_string(&self.records())?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&self.records())?),
        }
    }
}
