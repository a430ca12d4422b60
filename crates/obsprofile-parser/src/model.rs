use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ParserError;

/// One measurement row projected onto a single variable column.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub altitude_m: Option<f64>,
    pub value: Option<f64>,
    pub column_name: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `2014-08-01/2014-08-30`
    pub fn iso_range(&self) -> String {
        format!(
            "{}/{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// `20140801-20140830`, used when building output identities.
    pub fn compact_range(&self) -> String {
        format!(
            "{:04}{:02}{:02}-{:04}{:02}{:02}",
            self.start.year(),
            self.start.month(),
            self.start.day(),
            self.end.year(),
            self.end.month(),
            self.end.day()
        )
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iso_range())
    }
}

/// Bounding box exactly as written in the header. Longitudes keep their
/// source convention; use [`Region::normalized_lon_bounds`] for output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min_lat: f64,
    pub max_lat: f64,
    /// Western edge. May exceed `max_lon` when the box crosses 180°.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl Region {
    pub fn point(lat: f64, lon: f64) -> Self {
        Self {
            min_lat: lat,
            max_lat: lat,
            min_lon: lon,
            max_lon: lon,
        }
    }

    pub fn is_point(&self) -> bool {
        self.min_lat == self.max_lat && self.min_lon == self.max_lon
    }

    pub fn normalized_lon_bounds(&self) -> (f64, f64) {
        (
            normalize_longitude(self.min_lon),
            normalize_longitude(self.max_lon),
        )
    }
}

/// Maps a longitude onto the [0, 360) convention.
pub fn normalize_longitude(lon: f64) -> f64 {
    let shifted = lon.rem_euclid(360.0);
    if shifted >= 360.0 {
        0.0
    } else {
        shifted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHeader {
    pub campaign: String,
    pub period: Period,
    pub region: Region,
    pub declared_unit: String,
    pub column_schema: Vec<String>,
}

impl SourceHeader {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.column_schema
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSourceFile {
    pub file_hash: String,
    pub layout_name: String,
    pub header: SourceHeader,
    pub altitude_column: String,
    pub table: DataFrame,
}

impl ParsedSourceFile {
    pub fn row_count(&self) -> usize {
        self.table.height()
    }

    /// Projects the body onto `(altitude, value)` pairs for one variable column.
    pub fn records_for(&self, column: &str) -> Result<Vec<RawRecord>, ParserError> {
        let value_name = self.resolve_column(column)?;
        let altitude_name = self.resolve_column(&self.altitude_column)?;

        let altitude = self.float_column(altitude_name)?;
        let values = self.float_column(value_name)?;
        let column_name: Arc<str> = Arc::from(value_name);

        Ok(altitude
            .into_iter()
            .zip(values)
            .map(|(altitude_m, value)| RawRecord {
                altitude_m,
                value,
                column_name: Arc::clone(&column_name),
            })
            .collect())
    }

    fn resolve_column(&self, column: &str) -> Result<&str, ParserError> {
        self.header
            .column_index(column)
            .map(|idx| self.header.column_schema[idx].as_str())
            .ok_or_else(|| ParserError::MissingColumn {
                column: column.to_string(),
                available: self.header.column_schema.clone(),
            })
    }

    fn float_column(&self, name: &str) -> Result<Vec<Option<f64>>, ParserError> {
        let column = self
            .table
            .column(name)
            .and_then(|col| col.f64())
            .map_err(|err| ParserError::Validation {
                layout: self.layout_name.clone(),
                message: format!("failed to read column '{name}': {err}"),
            })?;
        Ok(column.into_iter().collect())
    }
}
