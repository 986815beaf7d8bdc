//! # Input Configuration Module
//!
//! Job configuration for [`crate::process_extraction_job`]. A job names a gridded
//! dataset, the variables to load from it, the locations to extract and, optionally, a
//! high-resolution raster whose context means are computed over every grid cell.
//!
//! Configurations are read from JSON or YAML; [`JobConfig::from_file`] picks the format
//! from the file extension.
//!
//! ## Example
//!
//! ```rust
//! use gridcontext::input::JobConfig;
//!
//! let yaml = r#"
//! dataset:
//!   path: era5.nc
//!   lat_name: latitude
//!   lon_name: longitude
//! variables:
//!   - name: t2m
//!     display_name: temperature
//!     transform: { type: unit_convert, from_unit: K, to_unit: degC }
//! points:
//!   - { lon: 6.5, lat: 50.5 }
//!   - { wkt: "POINT (723573.5 6547000.0)", crs: "EPSG:3857" }
//! "#;
//! let config = JobConfig::from_yaml(yaml)?;
//! assert_eq!(config.points.len(), 2);
//! # Ok::<(), gridcontext::error::GridError>(())
//! ```

use crate::aggregate::{CellErrorPolicy, ContextMeansOptions, DEFAULT_MAX_FILL_PASSES};
use crate::dataset::AxisNames;
use crate::error::{GridError, Result};
use crate::extract::TIME_COLUMN;
use crate::geometry::{Bounds, LocationInput};
use crate::store::Transform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete description of an extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub dataset: DatasetConfig,
    /// Variables to load, in order
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
    /// Locations to extract time series for
    #[serde(default)]
    pub points: Vec<LocationInput>,
    #[serde(default = "default_interpolation")]
    pub interpolation: String,
    /// Parquet path for point extractions; `{variable}` is replaced by the variable name
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub context: Option<ContextConfig>,
}

/// The gridded dataset and the window to read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: String,
    #[serde(default = "default_time_name")]
    pub time_name: String,
    #[serde(default = "default_lat_name")]
    pub lat_name: String,
    #[serde(default = "default_lon_name")]
    pub lon_name: String,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl DatasetConfig {
    pub fn axis_names(&self) -> AxisNames {
        AxisNames {
            time: self.time_name.clone(),
            lat: self.lat_name.clone(),
            lon: self.lon_name.clone(),
        }
    }
}

/// A variable to load, optionally renamed and transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub transform: Option<Transform>,
}

impl VariableConfig {
    /// Name the variable is stored and extracted under
    pub fn stored_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Context mean computation over every grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub raster: RasterConfig,
    #[serde(default = "default_true")]
    pub fill_missing: bool,
    #[serde(default = "default_max_fill_passes")]
    pub max_fill_passes: usize,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub on_cell_error: CellErrorPolicy,
    /// Parquet path for the long-format context means
    #[serde(default)]
    pub output: Option<String>,
}

impl ContextConfig {
    pub fn options(&self) -> ContextMeansOptions {
        ContextMeansOptions {
            fill_missing: self.fill_missing,
            max_fill_passes: self.max_fill_passes,
            threads: self.threads,
            on_cell_error: self.on_cell_error,
        }
    }
}

/// A 2-D NetCDF variable on a regular lat/lon grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterConfig {
    pub path: String,
    pub variable: String,
    #[serde(default = "default_lat_name")]
    pub lat_name: String,
    #[serde(default = "default_lon_name")]
    pub lon_name: String,
}

impl RasterConfig {
    pub fn axis_names(&self) -> AxisNames {
        AxisNames {
            lat: self.lat_name.clone(),
            lon: self.lon_name.clone(),
            ..AxisNames::default()
        }
    }
}

fn default_interpolation() -> String {
    "nearest".to_string()
}

fn default_time_name() -> String {
    "time".to_string()
}

fn default_lat_name() -> String {
    "lat".to_string()
}

fn default_lon_name() -> String {
    "lon".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_fill_passes() -> usize {
    DEFAULT_MAX_FILL_PASSES
}

impl JobConfig {
    /// Loads a job configuration from a file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, anything else as JSON.
    ///
    /// ```rust,no_run
    /// use gridcontext::input::JobConfig;
    ///
    /// let config = JobConfig::from_file("job.yaml")?;
    /// println!("Dataset: {}", config.dataset.path);
    /// # Ok::<(), gridcontext::error::GridError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_json(json_str: &str) -> Result<Self> {
        let config: JobConfig = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every declared transform has a known conversion and that no output
    /// column would take a coordinate column's name.
    pub fn validate(&self) -> Result<()> {
        for variable in &self.variables {
            if variable.stored_name() == TIME_COLUMN {
                return Err(GridError::ReservedName(TIME_COLUMN.to_string()));
            }
            if let Some(transform) = &variable.transform {
                transform.coefficients()?;
            }
        }
        if let Some(context) = &self.context {
            let name = context.raster.variable.as_str();
            if name == "lat" || name == "lon" {
                return Err(GridError::ReservedName(name.to_string()));
            }
        }
        Ok(())
    }
}
