//! # Variable Store
//!
//! Loaded variable arrays keyed by name. Each entry is an immutable, shared
//! (time, lat, lon) array; loading under an existing name replaces the old entry.
//!
//! Arrays may be transformed once at load time, either with a closure or with a
//! configured [`Transform`] such as a unit conversion.

use crate::error::{GridError, Result};
use log::debug;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Load-time transformations that can be declared in a job configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Convert between temperature units (kelvin, celsius, fahrenheit)
    UnitConvert { from_unit: String, to_unit: String },
    /// Linear rescaling: `value * factor + offset`
    Scale {
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
}

impl Transform {
    /// Returns `(factor, offset)` such that `converted = value * factor + offset`.
    ///
    /// Unit pairs without a known conversion fail with
    /// [`GridError::UnsupportedUnitConversion`].
    pub fn coefficients(&self) -> Result<(f64, f64)> {
        match self {
            Transform::Scale { factor, offset } => Ok((*factor, *offset)),
            Transform::UnitConvert { from_unit, to_unit } => {
                match (
                    normalize_unit(from_unit).as_str(),
                    normalize_unit(to_unit).as_str(),
                ) {
                    (from, to) if from == to => Ok((1.0, 0.0)),
                    ("kelvin", "celsius") => Ok((1.0, -273.15)),
                    ("celsius", "kelvin") => Ok((1.0, 273.15)),
                    ("celsius", "fahrenheit") => Ok((9.0 / 5.0, 32.0)),
                    ("fahrenheit", "celsius") => Ok((5.0 / 9.0, -32.0 * 5.0 / 9.0)),
                    ("kelvin", "fahrenheit") => Ok((9.0 / 5.0, -459.67)),
                    ("fahrenheit", "kelvin") => Ok((5.0 / 9.0, 459.67 * 5.0 / 9.0)),
                    _ => Err(GridError::UnsupportedUnitConversion {
                        from: from_unit.clone(),
                        to: to_unit.clone(),
                    }),
                }
            }
        }
    }

    pub fn apply(&self, values: Array3<f64>) -> Result<Array3<f64>> {
        let (factor, offset) = self.coefficients()?;
        debug!("Applying {:?} (factor {}, offset {})", self, factor, offset);
        Ok(rescale(values, factor, offset))
    }
}

/// `value * factor + offset` over the whole array.
pub fn rescale(mut values: Array3<f64>, factor: f64, offset: f64) -> Array3<f64> {
    values.mapv_inplace(|v| v * factor + offset);
    values
}

fn normalize_unit(unit: &str) -> String {
    match unit.to_lowercase().as_str() {
        "k" | "kelvin" => "kelvin".to_string(),
        "c" | "celsius" | "degc" | "degrees_celsius" => "celsius".to_string(),
        "f" | "fahrenheit" | "degf" => "fahrenheit".to_string(),
        other => other.to_string(),
    }
}

/// Named variable arrays, in load order.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    data: HashMap<String, Arc<Array3<f64>>>,
    order: Vec<String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `values` under `name`, replacing any previous array with that name.
    pub fn insert(&mut self, name: &str, values: Array3<f64>) {
        if self
            .data
            .insert(name.to_string(), Arc::new(values))
            .is_some()
        {
            debug!("Replaced stored variable '{}'", name);
        } else {
            self.order.push(name.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Array3<f64>>> {
        self.data.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
