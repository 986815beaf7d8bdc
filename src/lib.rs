//! # gridcontext
//!
//! Point extraction and area aggregation over regular lat/lon gridded datasets.
//!
//! ## Features
//!
//! - **Location normalization**: plain `(lon, lat)` pairs or WKT points in another
//!   reference system, validated one by one
//! - **Grid indexing**: nearest-neighbor lookup and cell footprints from midpoints
//!   between neighboring coordinates
//! - **Point extraction**: per-location time series as Polars DataFrames
//! - **Context means**: averages of a high-resolution raster over each cell footprint,
//!   with iterative gap filling, computed in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridcontext::{process_extraction_job, input::JobConfig};
//!
//! let config = JobConfig::from_file("job.yaml")?;
//! process_extraction_job(&config)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "dataset": { "path": "era5.nc", "bounds": { "lon_min": 5.0, "lat_min": 47.0, "lon_max": 15.0, "lat_max": 55.0 } },
//!   "variables": [ { "name": "t2m", "display_name": "temperature" } ],
//!   "points": [ { "lon": 6.5, "lat": 50.5 }, { "lon": 7.0, "lat": 51.0 } ],
//!   "output": "temperature.parquet",
//!   "context": {
//!     "raster": { "path": "elevation.nc", "variable": "z" },
//!     "output": "elevation_context.parquet"
//!   }
//! }
//! ```

pub mod aggregate;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod grid;
pub mod input;
pub mod log;
pub mod output;
pub mod raster;
pub mod source;
pub mod store;
pub mod time;


pub use crate::error::{GridError, Result};
pub use crate::source::GridSource;

use crate::input::{JobConfig, VariableConfig};
use crate::log::{show_dataset_info, show_job_summary};
use crate::output::{context_means_to_dataframe, write_dataframe_to_parquet};
use crate::raster::GeoRaster;
use crate::store::rescale;
use anyhow::{bail, Context};

/// Placeholder replaced by the variable name in extraction output paths
pub const VARIABLE_PLACEHOLDER: &str = "{variable}";

/// Runs an extraction job end to end.
///
/// 1. Opens the dataset and builds the grid window
/// 2. Loads every configured variable, applying its transform
/// 3. Extracts each variable at the configured points and writes or logs the result
/// 4. Computes context means of the configured raster, if any
///
/// # Errors
///
/// Fails when the dataset or raster cannot be read, a variable is missing, a location
/// cannot be normalized or an output file cannot be written.
pub fn process_extraction_job(config: &JobConfig) -> anyhow::Result<()> {
    show_job_summary(config);

    let mut source = GridSource::open(
        &config.dataset.path,
        config.dataset.axis_names(),
        config.dataset.bounds,
    )
    .with_context(|| format!("Failed to open dataset '{}'", config.dataset.path))?;
    show_dataset_info(source.dataset(), source.grid());

    for variable in &config.variables {
        load_variable(&mut source, variable)
            .with_context(|| format!("Failed to load variable '{}'", variable.name))?;
    }

    if !config.points.is_empty() {
        if let Some(output) = &config.output {
            if config.variables.len() > 1 && !output.contains(VARIABLE_PLACEHOLDER) {
                bail!(
                    "Output '{}' must contain {} when extracting {} variables",
                    output,
                    VARIABLE_PLACEHOLDER,
                    config.variables.len()
                );
            }
        }

        for variable in &config.variables {
            let name = variable.stored_name();
            let extraction = source
                .get(name, config.points.iter().cloned(), &config.interpolation)
                .with_context(|| format!("Failed to extract '{}'", name))?;

            match &config.output {
                Some(output) => {
                    let path = output.replace(VARIABLE_PLACEHOLDER, name);
                    write_dataframe_to_parquet(extraction.dataframe(), &path)
                        .with_context(|| format!("Failed to write '{}'", path))?;
                    ::log::info!("Wrote {} series to {}", name, path);
                }
                None => ::log::info!("{}:\n{}", name, extraction.dataframe()),
            }
        }
    }

    if let Some(context) = &config.context {
        let raster = GeoRaster::from_netcdf(
            &context.raster.path,
            &context.raster.variable,
            context.raster.axis_names(),
        )
        .with_context(|| format!("Failed to load raster '{}'", context.raster.path))?;

        let means = source
            .compute_context_means(&raster, &context.options())
            .context("Failed to compute context means")?;
        let df = context_means_to_dataframe(source.grid(), &means, &context.raster.variable)?;

        match &context.output {
            Some(path) => {
                write_dataframe_to_parquet(&df, path)
                    .with_context(|| format!("Failed to write '{}'", path))?;
                ::log::info!("Wrote context means to {}", path);
            }
            None => ::log::info!("Context means:\n{}", df),
        }
    }

    Ok(())
}

fn load_variable(source: &mut GridSource, variable: &VariableConfig) -> Result<()> {
    let name = Some(variable.stored_name());
    match &variable.transform {
        Some(transform) => {
            let (factor, offset) = transform.coefficients()?;
            source.load_with(&variable.name, name, |values| rescale(values, factor, offset))
        }
        None => source.load(&variable.name, name),
    }
}
