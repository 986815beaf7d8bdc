//! # Error Types
//!
//! A single error enum covers every failure the extraction and aggregation engine can
//! report. Errors are raised where they are detected and never retried internally.

use thiserror::Error;

/// Errors that can occur while indexing, extracting or aggregating gridded data
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Cannot understand location input: {0}")]
    UnrecognizedLocationType(String),

    #[error("Bounds exclude every {axis} value (range {min}..={max})")]
    EmptySelection { axis: String, min: f64, max: f64 },

    #[error("Variable '{0}' not found")]
    VariableNotFound(String),

    #[error("Unsupported interpolation scheme '{0}', only nearest-neighbor is implemented")]
    UnsupportedInterpolation(String),

    #[error("No conversion from '{from}' to '{to}'")]
    UnsupportedUnitConversion { from: String, to: String },

    #[error("'{0}' is reserved for a coordinate column")]
    ReservedName(String),

    #[error("Gap fill left {remaining} masked pixels missing after {passes} passes")]
    GapFillUnresolved { passes: usize, remaining: usize },

    #[error("No valid raster pixels inside the footprint")]
    NoValidPixels,

    #[error("Invalid {axis} axis: {reason}")]
    InvalidAxis { axis: String, reason: String },

    #[error("The {0} axis has a single value, cell footprints are undefined")]
    DegenerateAxis(String),

    #[error("Index ({lat_index}, {lon_index}) is outside a {n_lats}x{n_lons} grid")]
    IndexOutOfRange {
        lat_index: usize,
        lon_index: usize,
        n_lats: usize,
        n_lons: usize,
    },

    #[error("Array for '{variable}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        variable: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Cannot decode time units '{units}': {reason}")]
    TimeUnits { units: String, reason: String },

    #[error("Reprojection error: {0}")]
    Reprojection(String),

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for grid operations
pub type Result<T> = std::result::Result<T, GridError>;
