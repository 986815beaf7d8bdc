//! # Point Extraction
//!
//! Turns loaded (time, lat, lon) arrays into per-location time series held in Polars
//! DataFrames.
//!
//! - One location gives an [`Extraction::Series`] with a `time` column and a column named
//!   after the variable.
//! - Several locations give an [`Extraction::Table`] with a `time` column and one column
//!   per location, in input order, named `"<lon>,<lat>"`.
//!
//! Only nearest-neighbor sampling is implemented.

use crate::error::{GridError, Result};
use crate::geometry::Location;
use crate::grid::GridIndex;
use chrono::{DateTime, Utc};
use log::debug;
use ndarray::{s, Array3};
use polars::prelude::*;
use std::collections::HashMap;
use std::str::FromStr;

/// Name of the timestamp column in every extraction
pub const TIME_COLUMN: &str = "time";

/// Spatial interpolation scheme used to sample the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
}

impl FromStr for Interpolation {
    type Err = GridError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "near" | "nearest" => Ok(Interpolation::Nearest),
            _ => Err(GridError::UnsupportedInterpolation(s.to_string())),
        }
    }
}

/// Result of a point extraction.
#[derive(Debug, Clone)]
pub enum Extraction {
    Series(DataFrame),
    Table(DataFrame),
}

impl Extraction {
    pub fn dataframe(&self) -> &DataFrame {
        match self {
            Extraction::Series(df) | Extraction::Table(df) => df,
        }
    }

    pub fn into_dataframe(self) -> DataFrame {
        match self {
            Extraction::Series(df) | Extraction::Table(df) => df,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, Extraction::Series(_))
    }
}

/// Samples `values` at each location and arranges the series along `times`.
pub fn extract_points(
    grid: &GridIndex,
    times: &[DateTime<Utc>],
    values: &Array3<f64>,
    variable: &str,
    locations: &[Location],
    interpolation: Interpolation,
) -> Result<Extraction> {
    if locations.is_empty() {
        return Err(GridError::UnrecognizedLocationType(
            "no locations given".to_string(),
        ));
    }
    if variable == TIME_COLUMN {
        return Err(GridError::ReservedName(variable.to_string()));
    }

    let series: Vec<Vec<f64>> = match interpolation {
        Interpolation::Nearest => locations
            .iter()
            .map(|loc| {
                let index = grid.nearest_index(loc);
                debug!(
                    "Location {} -> cell ({}, {})",
                    loc, index.lat_index, index.lon_index
                );
                values
                    .slice(s![.., index.lat_index, index.lon_index])
                    .to_vec()
            })
            .collect(),
    };

    let mut columns: Vec<Column> = vec![time_column(times)?];
    if series.len() == 1 {
        columns.push(Series::new(variable.into(), series[0].clone()).into());
        return Ok(Extraction::Series(DataFrame::new(columns)?));
    }

    for (name, values) in location_column_names(locations).into_iter().zip(series) {
        columns.push(Series::new(name.as_str().into(), values).into());
    }
    Ok(Extraction::Table(DataFrame::new(columns)?))
}

/// Millisecond timestamps as a Polars datetime column.
pub fn time_column(times: &[DateTime<Utc>]) -> Result<Column> {
    let millis: Vec<i64> = times.iter().map(|t| t.timestamp_millis()).collect();
    let series = Series::new(TIME_COLUMN.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(series.into())
}

/// `"<lon>,<lat>"` per location; repeats get a `#<n>` suffix.
fn location_column_names(locations: &[Location]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    locations
        .iter()
        .map(|loc| {
            let base = loc.to_string();
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}#{}", base, *count - 1)
            }
        })
        .collect()
}
