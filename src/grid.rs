//! # Grid Index
//!
//! Holds the latitude/longitude axes of a gridded dataset, optionally windowed to a
//! [`Bounds`] rectangle, and answers the two spatial questions the engine needs:
//!
//! - [`GridIndex::nearest_index`]: which cell is closest to a location
//! - [`GridIndex::cell_footprint`]: which rectangle a cell covers
//!
//! Axes must be strictly monotonic, either ascending or descending. Windowing keeps a
//! contiguous index range per axis so dataset reads can be restricted to the window.

use crate::error::{GridError, Result};
use crate::geometry::{Bounds, CellFootprint, Location, MAX_LATITUDE};
use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Position of a cell in the (possibly windowed) axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub lat_index: usize,
    pub lon_index: usize,
}

impl Index {
    pub fn new(lat_index: usize, lon_index: usize) -> Self {
        Index {
            lat_index,
            lon_index,
        }
    }
}

impl From<(usize, usize)> for Index {
    fn from((lat_index, lon_index): (usize, usize)) -> Self {
        Index::new(lat_index, lon_index)
    }
}

#[derive(Debug, Clone)]
pub struct GridIndex {
    all_lats: Vec<f64>,
    all_lons: Vec<f64>,
    lat_sel: Range<usize>,
    lon_sel: Range<usize>,
}

impl GridIndex {
    /// Builds an index over the full axes, keeping only the values inside `bounds` when given.
    pub fn new(all_lats: Vec<f64>, all_lons: Vec<f64>, bounds: Option<Bounds>) -> Result<Self> {
        validate_axis("lat", &all_lats)?;
        validate_axis("lon", &all_lons)?;

        let (lat_sel, lon_sel) = match bounds {
            Some(b) => (
                select_range("lat", &all_lats, b.lat_min, b.lat_max)?,
                select_range("lon", &all_lons, b.lon_min, b.lon_max)?,
            ),
            None => (0..all_lats.len(), 0..all_lons.len()),
        };
        debug!(
            "Grid window: lat {:?} of {}, lon {:?} of {}",
            lat_sel,
            all_lats.len(),
            lon_sel,
            all_lons.len()
        );

        Ok(GridIndex {
            all_lats,
            all_lons,
            lat_sel,
            lon_sel,
        })
    }

    pub fn lats(&self) -> &[f64] {
        &self.all_lats[self.lat_sel.clone()]
    }

    pub fn lons(&self) -> &[f64] {
        &self.all_lons[self.lon_sel.clone()]
    }

    /// Index range of the window within the full latitude axis.
    pub fn lat_selection(&self) -> Range<usize> {
        self.lat_sel.clone()
    }

    /// Index range of the window within the full longitude axis.
    pub fn lon_selection(&self) -> Range<usize> {
        self.lon_sel.clone()
    }

    /// (number of latitudes, number of longitudes) of the window.
    pub fn shape(&self) -> (usize, usize) {
        (self.lat_sel.len(), self.lon_sel.len())
    }

    /// Nearest cell, chosen independently on each axis.
    ///
    /// Ties go to the lowest index. On non-uniform grids this may differ from the cell
    /// whose center is closest in 2-D.
    pub fn nearest_index(&self, location: &Location) -> Index {
        Index::new(
            argmin_distance(self.lats(), location.lat),
            argmin_distance(self.lons(), location.lon),
        )
    }

    /// Rectangle bounded by the midpoints between the cell and its neighbors on each axis.
    ///
    /// Neighbors outside the window are read from the full axes. At the edge of the full
    /// axes the half-width towards the existing neighbor is mirrored. Latitude edges are
    /// clamped to [-90, 90], so a row on a pole stops at the pole.
    pub fn cell_footprint(&self, index: Index) -> Result<CellFootprint> {
        let (n_lats, n_lons) = self.shape();
        if index.lat_index >= n_lats || index.lon_index >= n_lons {
            return Err(GridError::IndexOutOfRange {
                lat_index: index.lat_index,
                lon_index: index.lon_index,
                n_lats,
                n_lons,
            });
        }

        let (lat_a, lat_b) = cell_edges("lat", &self.all_lats, self.lat_sel.start + index.lat_index)?;
        let (lon_a, lon_b) = cell_edges("lon", &self.all_lons, self.lon_sel.start + index.lon_index)?;
        Ok(CellFootprint::from_edges(
            lon_a,
            lon_b,
            lat_a.clamp(-MAX_LATITUDE, MAX_LATITUDE),
            lat_b.clamp(-MAX_LATITUDE, MAX_LATITUDE),
        ))
    }

    /// Footprint of the cell nearest to `location`.
    pub fn context_area(&self, location: &Location) -> Result<CellFootprint> {
        self.cell_footprint(self.nearest_index(location))
    }

    /// Every index of the window in row-major (lat, then lon) order.
    pub fn indices(&self) -> impl Iterator<Item = Index> + '_ {
        let (n_lats, n_lons) = self.shape();
        (0..n_lats).flat_map(move |i| (0..n_lons).map(move |j| Index::new(i, j)))
    }
}

fn validate_axis(axis: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(GridError::InvalidAxis {
            axis: axis.to_string(),
            reason: "axis is empty".to_string(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(GridError::InvalidAxis {
            axis: axis.to_string(),
            reason: "axis holds non-finite values".to_string(),
        });
    }
    let ascending = values.windows(2).all(|w| w[0] < w[1]);
    let descending = values.windows(2).all(|w| w[0] > w[1]);
    if !ascending && !descending {
        return Err(GridError::InvalidAxis {
            axis: axis.to_string(),
            reason: "axis is not strictly monotonic".to_string(),
        });
    }
    Ok(())
}

/// Contiguous range of indices whose values fall in `[min, max]`.
fn select_range(axis: &str, values: &[f64], min: f64, max: f64) -> Result<Range<usize>> {
    let selected: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, val)| **val >= min && **val <= max)
        .map(|(idx, _)| idx)
        .collect();

    match (selected.first(), selected.last()) {
        (Some(&first), Some(&last)) => Ok(first..last + 1),
        _ => Err(GridError::EmptySelection {
            axis: axis.to_string(),
            min,
            max,
        }),
    }
}

fn argmin_distance(values: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Lower and upper cell edges (in axis order) for position `i` of the full axis.
fn cell_edges(axis: &str, values: &[f64], i: usize) -> Result<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return Err(GridError::DegenerateAxis(axis.to_string()));
    }
    let center = values[i];
    let low = if i > 0 {
        (center + values[i - 1]) / 2.0
    } else {
        center - (values[i + 1] - center) / 2.0
    };
    let high = if i + 1 < n {
        (center + values[i + 1]) / 2.0
    } else {
        center + (center - values[i - 1]) / 2.0
    };
    Ok((low, high))
}
