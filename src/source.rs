//! # Grid Sources
//!
//! [`GridSource`] ties a dataset handle to its grid index, decoded time axis and loaded
//! variables. Construction fixes the axes; [`GridSource::load`] adds variables; every
//! other operation is a read-only query.
//!
//! ```rust,no_run
//! use gridcontext::dataset::AxisNames;
//! use gridcontext::geometry::{Bounds, Location};
//! use gridcontext::source::GridSource;
//!
//! let mut source = GridSource::open("era5.nc", AxisNames::default(), Some(Bounds::new(5.0, 47.0, 15.0, 55.0)))?;
//! source.load("t2m", Some("temperature"))?;
//! let series = source.get("temperature", [Location::new(6.5, 50.5)], "nearest")?;
//! println!("{}", series.dataframe());
//! # Ok::<(), gridcontext::error::GridError>(())
//! ```

use crate::aggregate::{self, ContextMeansOptions};
use crate::dataset::{AxisNames, DatasetSource, NetCdfDataset};
use crate::error::{GridError, Result};
use crate::extract::{extract_points, Extraction, Interpolation, TIME_COLUMN};
use crate::geometry::{normalize_location, normalize_locations, Bounds, CellFootprint, LocationInput, Reprojector, WebMercator};
use crate::grid::{GridIndex, Index};
use crate::raster::RasterSource;
use crate::store::VariableStore;
use crate::time::decode_times;
use chrono::{DateTime, Utc};
use log::{debug, info};
use ndarray::{Array2, Array3};
use std::path::Path;
use std::sync::Arc;

pub struct GridSource<D: DatasetSource = NetCdfDataset> {
    dataset: D,
    grid: GridIndex,
    times: Vec<DateTime<Utc>>,
    store: VariableStore,
    reprojector: Arc<dyn Reprojector>,
}

impl GridSource<NetCdfDataset> {
    /// Opens a NetCDF dataset, optionally windowed to `bounds`.
    pub fn open<P: AsRef<Path>>(path: P, names: AxisNames, bounds: Option<Bounds>) -> Result<Self> {
        let dataset = NetCdfDataset::open(path, names.clone())?;
        GridSource::from_dataset(dataset, &names, bounds)
    }
}

impl<D: DatasetSource> GridSource<D> {
    pub fn from_dataset(dataset: D, names: &AxisNames, bounds: Option<Bounds>) -> Result<Self> {
        let lats = dataset.axis(&names.lat)?;
        let lons = dataset.axis(&names.lon)?;
        let grid = GridIndex::new(lats, lons, bounds)?;

        let raw_times = dataset.axis(&names.time)?;
        let units = dataset
            .attribute(&names.time, "units")?
            .ok_or_else(|| GridError::TimeUnits {
                units: String::new(),
                reason: format!("'{}' has no units attribute", names.time),
            })?;
        let calendar = dataset.attribute(&names.time, "calendar")?;
        let times = decode_times(&raw_times, &units, calendar.as_deref())?;

        let (n_lats, n_lons) = grid.shape();
        info!(
            "Opened grid with {} time steps and {}x{} cells",
            times.len(),
            n_lats,
            n_lons
        );

        Ok(GridSource {
            dataset,
            grid,
            times,
            store: VariableStore::new(),
            reprojector: Arc::new(WebMercator),
        })
    }

    /// Replaces the reference system service used for external geometries.
    pub fn with_reprojector(mut self, reprojector: Arc<dyn Reprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn lats(&self) -> &[f64] {
        self.grid.lats()
    }

    pub fn lons(&self) -> &[f64] {
        self.grid.lons()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn variable(&self, name: &str) -> Option<Arc<Array3<f64>>> {
        self.store.get(name)
    }

    /// Units attribute of a dataset variable, if any.
    pub fn units(&self, variable: &str) -> Result<Option<String>> {
        self.dataset.attribute(variable, "units")
    }

    /// Loads `variable` over the grid window and stores it under `name` (or its own name).
    pub fn load(&mut self, variable: &str, name: Option<&str>) -> Result<()> {
        self.load_with(variable, name, |values| values)
    }

    /// Like [`GridSource::load`], applying `transform` to the whole array before storing it.
    ///
    /// A stored name of `time` is rejected, since extractions use it for the time column.
    pub fn load_with<F>(&mut self, variable: &str, name: Option<&str>, transform: F) -> Result<()>
    where
        F: FnOnce(Array3<f64>) -> Array3<f64>,
    {
        let name = name.unwrap_or(variable);
        if name == TIME_COLUMN {
            return Err(GridError::ReservedName(name.to_string()));
        }
        if !self.dataset.has_variable(variable) {
            return Err(GridError::VariableNotFound(variable.to_string()));
        }
        let (n_lats, n_lons) = self.grid.shape();
        let expected = vec![self.times.len(), n_lats, n_lons];

        let values = self.dataset.read_window(
            variable,
            self.grid.lat_selection(),
            self.grid.lon_selection(),
        )?;
        check_shape(variable, &expected, values.shape())?;

        let values = transform(values);
        check_shape(variable, &expected, values.shape())?;

        debug!("Loaded '{}' as '{}' with shape {:?}", variable, name, expected);
        self.store.insert(name, values);
        Ok(())
    }

    /// Time series of a loaded variable at one or more locations.
    ///
    /// The interpolation name is checked before anything else is read.
    pub fn get<I>(&self, variable: &str, locations: I, interpolation: &str) -> Result<Extraction>
    where
        I: IntoIterator,
        I::Item: Into<LocationInput>,
    {
        let interpolation: Interpolation = interpolation.parse()?;
        let values = self
            .store
            .get(variable)
            .ok_or_else(|| GridError::VariableNotFound(variable.to_string()))?;
        let locations = normalize_locations(locations, self.reprojector.as_ref())?;

        extract_points(
            &self.grid,
            &self.times,
            &values,
            variable,
            &locations,
            interpolation,
        )
    }

    /// Footprint of the grid cell nearest to `location`.
    pub fn context_area(&self, location: impl Into<LocationInput>) -> Result<CellFootprint> {
        let location = normalize_location(&location.into(), self.reprojector.as_ref())?;
        self.grid.context_area(&location)
    }

    pub fn context_area_at(&self, index: Index) -> Result<CellFootprint> {
        self.grid.cell_footprint(index)
    }

    /// Context mean of `raster` for every cell of the grid window.
    pub fn compute_context_means(
        &self,
        raster: &dyn RasterSource,
        options: &ContextMeansOptions,
    ) -> Result<Array2<f64>> {
        aggregate::compute_context_means(raster, &self.grid, options)
    }
}

fn check_shape(variable: &str, expected: &[usize], found: &[usize]) -> Result<()> {
    if expected != found {
        return Err(GridError::ShapeMismatch {
            variable: variable.to_string(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
