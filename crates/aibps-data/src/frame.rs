//! Polars `DataFrame` source

use crate::error::{DataError, Result};
use crate::parse::parse_date;
use crate::source::SeriesSource;
use aibps_core::{Observation, TimeSeries};
use polars::prelude::*;

/// Serves each non-date column of a wide `DataFrame` as a series.
#[derive(Debug, Clone)]
pub struct FrameSource {
    frame: DataFrame,
    date_column: String,
}

impl FrameSource {
    /// Wrap `frame`, whose dates live in `date_column`.
    ///
    /// The date column may be a `Date`, `Datetime` or string column.
    pub fn new(frame: DataFrame, date_column: impl Into<String>) -> Result<Self> {
        let date_column = date_column.into();
        frame.column(&date_column)?;
        Ok(Self { frame, date_column })
    }

    /// Underlying frame.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    fn dates(&self) -> Result<Vec<Option<String>>> {
        let dates = self
            .frame
            .column(&self.date_column)?
            .cast(&DataType::String)?;
        Ok(dates
            .str()?
            .into_iter()
            .map(|d| d.map(str::to_string))
            .collect())
    }
}

impl SeriesSource for FrameSource {
    fn name(&self) -> &str {
        "frame"
    }

    fn fetch(&self, id: &str) -> Result<TimeSeries> {
        if id == self.date_column {
            return Err(DataError::InvalidSeries(format!("{id} is the date column")));
        }
        let column = self
            .frame
            .column(id)
            .map_err(|_| DataError::missing(id, "no such column"))?;
        let values = column.cast(&DataType::Float64)?;
        let values = values.f64()?;

        let mut observations = Vec::with_capacity(self.frame.height());
        for (row, (date, value)) in self.dates()?.into_iter().zip(values).enumerate() {
            let date = date.ok_or_else(|| {
                DataError::Parse(format!("{id}: missing date at row {row}"))
            })?;
            observations.push(Observation::new(parse_date(&date)?, value));
        }
        Ok(TimeSeries::new(id, observations))
    }

    fn identifiers(&self) -> Result<Vec<String>> {
        Ok(self
            .frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| *name != self.date_column)
            .collect())
    }
}
