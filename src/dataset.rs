//! # Dataset Handles
//!
//! The engine reads gridded data through the [`DatasetSource`] trait. Two handles are
//! provided:
//!
//! - [`NetCdfDataset`]: a NetCDF file opened with the `netcdf` crate
//! - [`MemoryDataset`]: arrays held in memory, for embedding and tests
//!
//! Variables are returned shaped (time, lat, lon). NetCDF packing (`scale_factor`,
//! `add_offset`) is applied on read and `_FillValue`/`missing_value` become NaN.

use crate::error::{GridError, Result};
use log::debug;
use ndarray::{s, Array3, ArrayD, Ix3};
use netcdf::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

/// Names of the coordinate variables in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisNames {
    #[serde(default = "default_time_name")]
    pub time: String,
    #[serde(default = "default_lat_name")]
    pub lat: String,
    #[serde(default = "default_lon_name")]
    pub lon: String,
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

impl Default for AxisNames {
    fn default() -> Self {
        AxisNames {
            time: default_time_name(),
            lat: default_lat_name(),
            lon: default_lon_name(),
        }
    }
}

/// Read access to a gridded dataset.
pub trait DatasetSource {
    /// Values of a one-dimensional coordinate variable.
    fn axis(&self, name: &str) -> Result<Vec<f64>>;

    /// A text attribute of a variable, `None` when the attribute is absent.
    fn attribute(&self, variable: &str, attribute: &str) -> Result<Option<String>>;

    fn has_variable(&self, name: &str) -> bool;

    fn variable_names(&self) -> Vec<String>;

    /// The full time extent of `variable` restricted to the given lat/lon index ranges,
    /// shaped (time, lat, lon).
    fn read_window(
        &self,
        variable: &str,
        lat_sel: Range<usize>,
        lon_sel: Range<usize>,
    ) -> Result<Array3<f64>>;
}

pub struct NetCdfDataset {
    file: netcdf::File,
    names: AxisNames,
}

impl NetCdfDataset {
    pub fn open<P: AsRef<Path>>(path: P, names: AxisNames) -> Result<Self> {
        debug!("Opening NetCDF dataset: {}", path.as_ref().display());
        let file = netcdf::open(path.as_ref())?;
        Ok(NetCdfDataset { file, names })
    }

    pub fn names(&self) -> &AxisNames {
        &self.names
    }

    pub fn file(&self) -> &netcdf::File {
        &self.file
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| GridError::VariableNotFound(name.to_string()))
    }
}

impl DatasetSource for NetCdfDataset {
    fn axis(&self, name: &str) -> Result<Vec<f64>> {
        let var = self.variable(name)?;
        let values = var.get::<f64, _>(..)?;
        Ok(unpack(&var, values).iter().cloned().collect())
    }

    fn attribute(&self, variable: &str, attribute: &str) -> Result<Option<String>> {
        let var = self.variable(variable)?;
        match var.attribute(attribute) {
            Some(attr) => match attr.value()? {
                AttributeValue::Str(s) => Ok(Some(s)),
                AttributeValue::Strs(ss) => Ok(Some(ss.join(" "))),
                other => Ok(Some(format!("{:?}", other))),
            },
            None => Ok(None),
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    fn variable_names(&self) -> Vec<String> {
        self.file.variables().map(|v| v.name()).collect()
    }

    fn read_window(
        &self,
        variable: &str,
        lat_sel: Range<usize>,
        lon_sel: Range<usize>,
    ) -> Result<Array3<f64>> {
        let var = self.variable(variable)?;
        let dim_names: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        if dim_names.len() != 3 {
            return Err(GridError::ShapeMismatch {
                variable: variable.to_string(),
                expected: vec![3],
                found: vec![dim_names.len()],
            });
        }

        let position = |axis: &str| dim_names.iter().position(|d| d == axis);
        let order = (
            position(&self.names.time),
            position(&self.names.lat),
            position(&self.names.lon),
        );

        let window = match order {
            (Some(0), Some(1), Some(2)) => {
                let values = var.get::<f64, _>((.., lat_sel, lon_sel))?;
                values.into_dimensionality::<Ix3>()?
            }
            (Some(t), Some(y), Some(x)) => {
                debug!(
                    "Variable '{}' stored as {:?}, permuting to (time, lat, lon)",
                    variable, dim_names
                );
                let values = var.get::<f64, _>(..)?.into_dimensionality::<Ix3>()?;
                values
                    .permuted_axes([t, y, x])
                    .slice(s![.., lat_sel, lon_sel])
                    .to_owned()
            }
            _ => {
                return Err(GridError::ShapeMismatch {
                    variable: variable.to_string(),
                    expected: vec![3],
                    found: vec![dim_names.len()],
                });
            }
        };

        let window = unpack(&var, window.into_dyn()).into_dimensionality::<Ix3>()?;
        Ok(window.as_standard_layout().to_owned())
    }
}

fn numeric_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<f64> {
    let value = var.attribute(name)?.value().ok()?;
    match value {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Uchar(v) => Some(v as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|f| *f as f64),
        _ => None,
    }
}

/// Masks fill values and applies CF packing attributes.
pub(crate) fn unpack(var: &netcdf::Variable<'_>, mut values: ArrayD<f64>) -> ArrayD<f64> {
    let fill_values: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| numeric_attribute(var, name))
        .collect();
    let scale = numeric_attribute(var, "scale_factor").unwrap_or(1.0);
    let offset = numeric_attribute(var, "add_offset").unwrap_or(0.0);

    values.mapv_inplace(|v| {
        if fill_values.iter().any(|fv| *fv == v) {
            f64::NAN
        } else {
            v * scale + offset
        }
    });
    values
}

/// In-memory dataset with variables stored as (time, lat, lon) arrays over the full axes.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    axes: HashMap<String, Vec<f64>>,
    variables: HashMap<String, Array3<f64>>,
    attributes: HashMap<(String, String), String>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, name: &str, values: Vec<f64>) -> Self {
        self.axes.insert(name.to_string(), values);
        self
    }

    pub fn with_variable(mut self, name: &str, values: Array3<f64>) -> Self {
        self.variables.insert(name.to_string(), values);
        self
    }

    pub fn with_attribute(mut self, variable: &str, attribute: &str, value: &str) -> Self {
        self.attributes.insert(
            (variable.to_string(), attribute.to_string()),
            value.to_string(),
        );
        self
    }
}

impl DatasetSource for MemoryDataset {
    fn axis(&self, name: &str) -> Result<Vec<f64>> {
        self.axes
            .get(name)
            .cloned()
            .ok_or_else(|| GridError::VariableNotFound(name.to_string()))
    }

    fn attribute(&self, variable: &str, attribute: &str) -> Result<Option<String>> {
        if !self.has_variable(variable) {
            return Err(GridError::VariableNotFound(variable.to_string()));
        }
        Ok(self
            .attributes
            .get(&(variable.to_string(), attribute.to_string()))
            .cloned())
    }

    fn has_variable(&self, name: &str) -> bool {
        self.axes.contains_key(name) || self.variables.contains_key(name)
    }

    fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .axes
            .keys()
            .chain(self.variables.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn read_window(
        &self,
        variable: &str,
        lat_sel: Range<usize>,
        lon_sel: Range<usize>,
    ) -> Result<Array3<f64>> {
        let values = self
            .variables
            .get(variable)
            .ok_or_else(|| GridError::VariableNotFound(variable.to_string()))?;
        let (_, n_lats, n_lons) = values.dim();
        if lat_sel.end > n_lats || lon_sel.end > n_lons {
            return Err(GridError::ShapeMismatch {
                variable: variable.to_string(),
                expected: vec![lat_sel.end, lon_sel.end],
                found: vec![n_lats, n_lons],
            });
        }
        Ok(values.slice(s![.., lat_sel, lon_sel]).to_owned())
    }
}
