//! # Raster Sources
//!
//! High-resolution context layers are consumed through [`RasterSource`], which can
//! describe its native resolution and clip itself to a cell footprint.
//!
//! [`GeoRaster`] is a north-up raster held in memory. Clipping resamples by nearest
//! sample onto a pixel grid anchored at the raster origin; pixels whose centers fall
//! inside the footprint are flagged in the returned mask.

use crate::dataset::{unpack, AxisNames, DatasetSource, NetCdfDataset};
use crate::error::{GridError, Result};
use crate::geometry::{
    CellFootprint, Crs, Reprojector, WebMercator, MAX_LATITUDE, MAX_MERCATOR_LATITUDE,
};
use log::debug;
use ndarray::{Array2, Axis, Ix2};
use std::path::Path;

/// Native resolution and reference system of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterInfo {
    pub pixel_size: (f64, f64),
    pub crs: Crs,
}

/// Raster values clipped to a footprint, with the in-footprint mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedWindow {
    pub values: Array2<f64>,
    pub mask: Array2<bool>,
}

pub trait RasterSource: Send + Sync {
    fn describe(&self) -> Result<RasterInfo>;

    /// Clips the raster to `footprint` (given in EPSG:4326) on a grid of `pixel_size`
    /// in `crs`. Pixels without data are NaN.
    fn warp(&self, footprint: &CellFootprint, pixel_size: (f64, f64), crs: Crs) -> Result<MaskedWindow>;
}

#[derive(Debug, Clone)]
pub struct GeoRaster {
    data: Array2<f64>,
    origin: (f64, f64),
    pixel_size: (f64, f64),
    crs: Crs,
    nodata: Option<f64>,
}

impl GeoRaster {
    /// `data` rows run north to south; `origin` is the top-left corner.
    pub fn new(data: Array2<f64>, origin: (f64, f64), pixel_size: (f64, f64), crs: Crs) -> Result<Self> {
        if data.is_empty() {
            return Err(GridError::InvalidRaster("raster has no pixels".to_string()));
        }
        let (dx, dy) = pixel_size;
        if !(dx.is_finite() && dy.is_finite() && dx > 0.0 && dy > 0.0) {
            return Err(GridError::InvalidRaster(format!(
                "pixel size must be positive, got ({}, {})",
                dx, dy
            )));
        }
        Ok(GeoRaster {
            data,
            origin,
            pixel_size,
            crs,
            nodata: None,
        })
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Loads a 2-D variable over (lat, lon) in either order, with regularly spaced
    /// coordinates, as an EPSG:4326 raster.
    pub fn from_netcdf<P: AsRef<Path>>(path: P, variable: &str, names: AxisNames) -> Result<Self> {
        let dataset = NetCdfDataset::open(path, names)?;
        let lats = dataset.axis(&dataset.names().lat)?;
        let lons = dataset.axis(&dataset.names().lon)?;
        let dy = regular_spacing("lat", &lats)?;
        let dx = regular_spacing("lon", &lons)?;

        let var = dataset
            .file()
            .variable(variable)
            .ok_or_else(|| GridError::VariableNotFound(variable.to_string()))?;
        let dim_names: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let position = |axis: &str| dim_names.iter().position(|d| d == axis);
        let data = unpack(&var, var.get::<f64, _>(..)?).into_dimensionality::<Ix2>()?;
        let mut data = match (position(&dataset.names().lat), position(&dataset.names().lon)) {
            (Some(0), Some(1)) => data,
            (Some(1), Some(0)) => {
                debug!("Raster '{}' stored as {:?}, transposing to (lat, lon)", variable, dim_names);
                data.reversed_axes()
            }
            _ => {
                return Err(GridError::InvalidRaster(format!(
                    "'{}' has dimensions {:?}, expected '{}' and '{}'",
                    variable,
                    dim_names,
                    dataset.names().lat,
                    dataset.names().lon
                )));
            }
        };
        if data.dim() != (lats.len(), lons.len()) {
            return Err(GridError::ShapeMismatch {
                variable: variable.to_string(),
                expected: vec![lats.len(), lons.len()],
                found: data.shape().to_vec(),
            });
        }

        // north-up rows
        let north_first = lats[0] > lats[lats.len() - 1];
        if !north_first {
            data.invert_axis(Axis(0));
        }
        let lat_top = lats.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lon_left = lons.iter().cloned().fold(f64::INFINITY, f64::min);
        if lons[0] > lons[lons.len() - 1] {
            data.invert_axis(Axis(1));
        }

        debug!(
            "Loaded raster '{}' {:?} with pixel size ({}, {})",
            variable,
            data.dim(),
            dx,
            dy
        );
        GeoRaster::new(
            data.as_standard_layout().to_owned(),
            (lon_left - dx / 2.0, lat_top + dy / 2.0),
            (dx, dy),
            Crs::EPSG_4326,
        )
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    fn sample(&self, x: f64, y: f64) -> f64 {
        let (dx, dy) = self.pixel_size;
        let col = ((x - self.origin.0) / dx).floor();
        let row = ((self.origin.1 - y) / dy).floor();
        let (nrows, ncols) = self.data.dim();
        if col < 0.0 || row < 0.0 || col >= ncols as f64 || row >= nrows as f64 {
            return f64::NAN;
        }
        let value = self.data[[row as usize, col as usize]];
        match self.nodata {
            Some(nd) if nd == value => f64::NAN,
            _ => value,
        }
    }
}

impl RasterSource for GeoRaster {
    fn describe(&self) -> Result<RasterInfo> {
        Ok(RasterInfo {
            pixel_size: self.pixel_size,
            crs: self.crs,
        })
    }

    fn warp(&self, footprint: &CellFootprint, pixel_size: (f64, f64), crs: Crs) -> Result<MaskedWindow> {
        if crs != self.crs {
            return Err(GridError::Reprojection(format!(
                "Cannot warp a {} raster onto a {} grid",
                self.crs, crs
            )));
        }
        let (px, py) = pixel_size;
        if !(px > 0.0 && py > 0.0) {
            return Err(GridError::InvalidRaster(format!(
                "pixel size must be positive, got ({}, {})",
                px, py
            )));
        }

        // Web Mercator has no northing past its square extent
        let lat_limit = if crs == Crs::EPSG_3857 {
            MAX_MERCATOR_LATITUDE
        } else {
            MAX_LATITUDE
        };
        let lat_min = footprint.lat_min.clamp(-lat_limit, lat_limit);
        let lat_max = footprint.lat_max.clamp(-lat_limit, lat_limit);

        // Footprint corners in the raster's reference system
        let (x_min, y_min) = WebMercator.reproject(footprint.lon_min, lat_min, Crs::EPSG_4326, crs)?;
        let (x_max, y_max) = WebMercator.reproject(footprint.lon_max, lat_max, Crs::EPSG_4326, crs)?;
        let area = CellFootprint::from_edges(x_min, x_max, y_min, y_max);

        let col0 = ((area.lon_min - self.origin.0) / px).floor();
        let col1 = ((area.lon_max - self.origin.0) / px).ceil();
        let row0 = ((self.origin.1 - area.lat_max) / py).floor();
        let row1 = ((self.origin.1 - area.lat_min) / py).ceil();
        let ncols = ((col1 - col0) as usize).max(1);
        let nrows = ((row1 - row0) as usize).max(1);
        let x0 = self.origin.0 + col0 * px;
        let y0 = self.origin.1 - row0 * py;

        let center = |r: usize, c: usize| (x0 + (c as f64 + 0.5) * px, y0 - (r as f64 + 0.5) * py);
        let values = Array2::from_shape_fn((nrows, ncols), |(r, c)| {
            let (x, y) = center(r, c);
            self.sample(x, y)
        });
        let mask = Array2::from_shape_fn((nrows, ncols), |(r, c)| {
            let (x, y) = center(r, c);
            area.contains(x, y)
        });

        Ok(MaskedWindow { values, mask })
    }
}

fn regular_spacing(axis: &str, values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(GridError::DegenerateAxis(axis.to_string()));
    }
    let step = (values[values.len() - 1] - values[0]) / (values.len() - 1) as f64;
    let regular = values
        .windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= step.abs() * 1e-4);
    if !regular || step == 0.0 {
        return Err(GridError::InvalidRaster(format!(
            "{} coordinates are not regularly spaced",
            axis
        )));
    }
    Ok(step.abs())
}
