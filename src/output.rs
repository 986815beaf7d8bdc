//! # Parquet Output Module
//!
//! Writes extraction and context mean DataFrames to Parquet files.

use crate::error::{GridError, Result};
use crate::grid::GridIndex;
use log::debug;
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;

/// Writes a DataFrame to a Parquet file.
///
/// # Errors
///
/// Fails when the output path is not writable or the DataFrame holds types Parquet
/// cannot store.
pub fn write_dataframe_to_parquet(df: &DataFrame, output_path: &str) -> Result<()> {
    debug!("Writing DataFrame to parquet file: {}", output_path);
    debug!("DataFrame shape: {:?}", df.shape());
    debug!("DataFrame schema:\n{:?}", df.schema());
    debug!("First few rows:\n{}", df.head(Some(5)));

    let file = File::create(output_path)?;
    let mut df = df.clone();
    ParquetWriter::new(file).finish(&mut df)?;

    debug!("Successfully wrote parquet file: {}", output_path);
    Ok(())
}

/// Long-format table of context means: one `lat, lon, <name>` row per grid cell.
pub fn context_means_to_dataframe(grid: &GridIndex, means: &Array2<f64>, name: &str) -> Result<DataFrame> {
    if name == "lat" || name == "lon" {
        return Err(GridError::ReservedName(name.to_string()));
    }
    let (n_lats, n_lons) = grid.shape();
    if means.dim() != (n_lats, n_lons) {
        return Err(GridError::ShapeMismatch {
            variable: name.to_string(),
            expected: vec![n_lats, n_lons],
            found: means.shape().to_vec(),
        });
    }

    let mut lats = Vec::with_capacity(n_lats * n_lons);
    let mut lons = Vec::with_capacity(n_lats * n_lons);
    let mut values = Vec::with_capacity(n_lats * n_lons);
    for index in grid.indices() {
        lats.push(grid.lats()[index.lat_index]);
        lons.push(grid.lons()[index.lon_index]);
        values.push(means[[index.lat_index, index.lon_index]]);
    }

    let df = DataFrame::new(vec![
        Series::new("lat".into(), lats).into(),
        Series::new("lon".into(), lons).into(),
        Series::new(name.into(), values).into(),
    ])?;
    Ok(df)
}
