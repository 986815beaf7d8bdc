//! # Context Means
//!
//! Spatial averages of a high-resolution raster over grid cell footprints.
//!
//! Raster pixels with negative values are treated as missing data. Before averaging,
//! missing pixels can be filled iteratively from their valid up/down/left/right
//! neighbors; the fill loop stops with [`GridError::GapFillUnresolved`] when a pass makes
//! no progress or the pass cap is reached.
//!
//! ```rust
//! use gridcontext::aggregate::{compute_context_mean, ContextMeanOptions};
//! use gridcontext::geometry::{CellFootprint, Crs};
//! use gridcontext::raster::GeoRaster;
//! use ndarray::Array2;
//!
//! let raster = GeoRaster::new(Array2::from_elem((4, 4), 2.0), (0.0, 4.0), (1.0, 1.0), Crs::EPSG_4326)?;
//! let footprint = CellFootprint::from_edges(0.0, 2.0, 2.0, 4.0);
//! let mean = compute_context_mean(&raster, &footprint, &ContextMeanOptions::default())?;
//! assert_eq!(mean, 2.0);
//! # Ok::<(), gridcontext::error::GridError>(())
//! ```

use crate::error::{GridError, Result};
use crate::geometry::{CellFootprint, Crs};
use crate::grid::{GridIndex, Index};
use crate::raster::RasterSource;
use log::{debug, info, warn};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound on gap-fill passes for a single footprint
pub const DEFAULT_MAX_FILL_PASSES: usize = 10_000;

/// Options for a single footprint mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMeanOptions {
    pub fill_missing: bool,
    /// Resampling pixel size, the raster's own when `None`
    pub pixel_size: Option<(f64, f64)>,
    /// Resampling reference system, the raster's own when `None`
    pub crs: Option<Crs>,
    pub max_fill_passes: usize,
}

impl Default for ContextMeanOptions {
    fn default() -> Self {
        ContextMeanOptions {
            fill_missing: true,
            pixel_size: None,
            crs: None,
            max_fill_passes: DEFAULT_MAX_FILL_PASSES,
        }
    }
}

/// What the grid-wide computation does when one cell fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellErrorPolicy {
    /// Abort the whole computation with the first error
    #[default]
    Fail,
    /// Record NaN for the failed cell and continue
    Missing,
}

/// Options for [`compute_context_means`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMeansOptions {
    pub fill_missing: bool,
    pub max_fill_passes: usize,
    /// Worker threads, rayon's global pool when `None`
    pub threads: Option<usize>,
    pub on_cell_error: CellErrorPolicy,
}

impl Default for ContextMeansOptions {
    fn default() -> Self {
        ContextMeansOptions {
            fill_missing: true,
            max_fill_passes: DEFAULT_MAX_FILL_PASSES,
            threads: None,
            on_cell_error: CellErrorPolicy::Fail,
        }
    }
}

/// Mean raster value inside `footprint`.
pub fn compute_context_mean(
    raster: &dyn RasterSource,
    footprint: &CellFootprint,
    options: &ContextMeanOptions,
) -> Result<f64> {
    let (pixel_size, crs) = match (options.pixel_size, options.crs) {
        (Some(pixel_size), Some(crs)) => (pixel_size, crs),
        (pixel_size, crs) => {
            let info = raster.describe()?;
            (pixel_size.unwrap_or(info.pixel_size), crs.unwrap_or(info.crs))
        }
    };

    let window = raster.warp(footprint, pixel_size, crs)?;
    let mask = window.mask;
    let mut values = window.values;
    values.mapv_inplace(|v| if v < 0.0 { f64::NAN } else { v });

    if !mask.iter().any(|m| *m) {
        return Err(GridError::NoValidPixels);
    }

    if options.fill_missing && count_missing(&values, &mask) > 0 {
        if values.iter().all(|v| v.is_nan()) {
            return Err(GridError::NoValidPixels);
        }
        let passes = fill_missing(&mut values, &mask, options.max_fill_passes)?;
        debug!("Gap fill finished after {} passes", passes);
    }

    let (sum, count) = values
        .iter()
        .zip(mask.iter())
        .filter(|(v, m)| **m && !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), (v, _)| (sum + v, count + 1));

    if count == 0 {
        return Err(GridError::NoValidPixels);
    }
    Ok(sum / count as f64)
}

fn count_missing(values: &Array2<f64>, mask: &Array2<bool>) -> usize {
    values
        .iter()
        .zip(mask.iter())
        .filter(|(v, m)| **m && v.is_nan())
        .count()
}

/// Replaces NaN pixels with the mean of their valid 4-neighbors until no masked pixel is
/// missing. Each pass reads the previous pass's values. Returns the number of passes.
pub fn fill_missing(values: &mut Array2<f64>, mask: &Array2<bool>, max_passes: usize) -> Result<usize> {
    let (nrows, ncols) = values.dim();
    let mut passes = 0;

    loop {
        let remaining = count_missing(values, mask);
        if remaining == 0 {
            return Ok(passes);
        }
        if passes >= max_passes {
            return Err(GridError::GapFillUnresolved { passes, remaining });
        }

        let mut next = values.clone();
        let mut filled = 0;
        for ((r, c), v) in values.indexed_iter() {
            if !v.is_nan() {
                continue;
            }
            let mut neighbors = [f64::NAN; 4];
            if r > 0 {
                neighbors[0] = values[[r - 1, c]];
            }
            if c > 0 {
                neighbors[1] = values[[r, c - 1]];
            }
            if r + 1 < nrows {
                neighbors[2] = values[[r + 1, c]];
            }
            if c + 1 < ncols {
                neighbors[3] = values[[r, c + 1]];
            }

            let (sum, count) = neighbors
                .iter()
                .filter(|n| !n.is_nan())
                .fold((0.0, 0usize), |(sum, count), n| (sum + n, count + 1));
            if count > 0 {
                next[[r, c]] = sum / count as f64;
                filled += 1;
            }
        }

        if filled == 0 {
            return Err(GridError::GapFillUnresolved { passes, remaining });
        }
        *values = next;
        passes += 1;
    }
}

/// Context mean of every cell of `grid`, shaped (lats, lons).
///
/// Cells are computed in parallel at the raster's native resolution.
pub fn compute_context_means(
    raster: &dyn RasterSource,
    grid: &GridIndex,
    options: &ContextMeansOptions,
) -> Result<Array2<f64>> {
    let info = raster.describe()?;
    let cell_options = ContextMeanOptions {
        fill_missing: options.fill_missing,
        pixel_size: Some(info.pixel_size),
        crs: Some(info.crs),
        max_fill_passes: options.max_fill_passes,
    };
    let (n_lats, n_lons) = grid.shape();
    let indices: Vec<Index> = grid.indices().collect();
    info!(
        "Computing context means for {}x{} cells at pixel size {:?} ({})",
        n_lats, n_lons, info.pixel_size, info.crs
    );

    let run = || -> Result<Vec<f64>> {
        let results: Vec<(Index, Result<f64>)> = indices
            .par_iter()
            .map(|index| {
                let mean = grid
                    .cell_footprint(*index)
                    .and_then(|footprint| compute_context_mean(raster, &footprint, &cell_options));
                (*index, mean)
            })
            .collect();

        results
            .into_iter()
            .map(|(index, mean)| match (mean, options.on_cell_error) {
                (Ok(mean), _) => Ok(mean),
                (Err(e), CellErrorPolicy::Missing) => {
                    warn!(
                        "Context mean failed for cell ({}, {}): {}",
                        index.lat_index, index.lon_index, e
                    );
                    Ok(f64::NAN)
                }
                (Err(e), CellErrorPolicy::Fail) => Err(e),
            })
            .collect()
    };

    let means = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                GridError::ThreadPool(format!(
                    "Failed to build a pool with {} threads: {}",
                    threads, e
                ))
            })?
            .install(run)?,
        None => run()?,
    };

    Ok(Array2::from_shape_vec((n_lats, n_lons), means)?)
}
