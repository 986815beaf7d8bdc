//! # Location Geometry
//!
//! Value types for geographic locations and rectangles, plus the normalization step that
//! turns heterogeneous location inputs into plain EPSG:4326 [`Location`]s.
//!
//! ## Location Inputs
//!
//! - [`LocationInput::Point`]: a longitude/latitude pair already in EPSG:4326
//! - [`LocationInput::External`]: a georeferenced [`Geometry`] (WKT text plus its [`Crs`])
//!
//! Every element of a collection is checked on its own, so mixing both kinds in one list
//! is allowed. External geometries in another reference system are reprojected through a
//! [`Reprojector`].
//!
//! ```rust
//! use gridcontext::geometry::{normalize_locations, Crs, Geometry, Location, LocationInput, WebMercator};
//!
//! let inputs = vec![
//!     LocationInput::from(Location::new(6.5, 50.5)),
//!     LocationInput::from(Geometry::point(0.0, 0.0, Crs::EPSG_3857)),
//! ];
//! let locations = normalize_locations(inputs, &WebMercator)?;
//! assert_eq!(locations.len(), 2);
//! # Ok::<(), gridcontext::error::GridError>(())
//! ```

use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A geographic point as longitude/latitude in EPSG:4326.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Self {
        Location { lon, lat }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lon, self.lat)
    }
}

impl From<(f64, f64)> for Location {
    fn from((lon, lat): (f64, f64)) -> Self {
        Location { lon, lat }
    }
}

/// Geographic rectangle used to window a grid when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl Bounds {
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Bounds {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        }
    }
}

impl From<(f64, f64, f64, f64)> for Bounds {
    fn from((lon_min, lat_min, lon_max, lat_max): (f64, f64, f64, f64)) -> Self {
        Bounds::new(lon_min, lat_min, lon_max, lat_max)
    }
}

impl From<[f64; 4]> for Bounds {
    fn from(b: [f64; 4]) -> Self {
        Bounds::new(b[0], b[1], b[2], b[3])
    }
}

/// Rectangle covering the exclusive area of one grid cell, in EPSG:4326.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellFootprint {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl CellFootprint {
    /// Builds a footprint from two edges per axis given in any order.
    pub fn from_edges(lon_a: f64, lon_b: f64, lat_a: f64, lat_b: f64) -> Self {
        CellFootprint {
            lon_min: lon_a.min(lon_b),
            lat_min: lat_a.min(lat_b),
            lon_max: lon_a.max(lon_b),
            lat_max: lat_a.max(lat_b),
        }
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn center(&self) -> Location {
        Location::new(
            (self.lon_min + self.lon_max) / 2.0,
            (self.lat_min + self.lat_max) / 2.0,
        )
    }

    /// Half-open containment: the low edges belong to the cell, the high edges to the next one.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon < self.lon_max && lat >= self.lat_min && lat < self.lat_max
    }

    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON (({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))",
            x0 = self.lon_min,
            y0 = self.lat_min,
            x1 = self.lon_max,
            y1 = self.lat_max
        )
    }
}

/// Coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(pub u32);

impl Crs {
    pub const EPSG_4326: Crs = Crs(4326);
    pub const EPSG_3857: Crs = Crs(3857);

    pub fn epsg(&self) -> u32 {
        self.0
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::EPSG_4326
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s
            .trim()
            .to_ascii_uppercase()
            .strip_prefix("EPSG:")
            .map(str::to_string)
            .unwrap_or_else(|| s.trim().to_string());
        code.parse::<u32>()
            .map(Crs)
            .map_err(|_| GridError::Reprojection(format!("Unknown reference system '{}'", s)))
    }
}

impl TryFrom<String> for Crs {
    type Error = GridError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// A georeferenced geometry handed over by an external geometry library, as WKT text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub wkt: String,
    #[serde(default)]
    pub crs: Crs,
}

impl Geometry {
    pub fn new(wkt: impl Into<String>, crs: Crs) -> Self {
        Geometry {
            wkt: wkt.into(),
            crs,
        }
    }

    pub fn point(x: f64, y: f64, crs: Crs) -> Self {
        Geometry::new(format!("POINT ({} {})", x, y), crs)
    }

    /// Returns the (x, y) coordinates of a `POINT` geometry.
    pub fn point_coords(&self) -> Result<(f64, f64)> {
        let text = self.wkt.trim();
        let upper = text.to_ascii_uppercase();
        let Some(rest) = upper.strip_prefix("POINT") else {
            let kind = upper.split(|c: char| c == '(' || c.is_whitespace()).next().unwrap_or("");
            return Err(GridError::UnrecognizedLocationType(format!(
                "expected a POINT geometry, found '{}'",
                kind
            )));
        };
        let rest = rest.trim_start();
        let rest = rest
            .strip_prefix("ZM")
            .or_else(|| rest.strip_prefix('Z'))
            .or_else(|| rest.strip_prefix('M'))
            .unwrap_or(rest)
            .trim();

        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| {
                GridError::UnrecognizedLocationType(format!("malformed point '{}'", self.wkt))
            })?;

        let coords: Vec<f64> = inner
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| {
                GridError::UnrecognizedLocationType(format!("malformed point '{}'", self.wkt))
            })?;

        match coords.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(GridError::UnrecognizedLocationType(format!(
                "point '{}' needs two coordinates",
                self.wkt
            ))),
        }
    }
}

/// Any location a caller may hand to the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationInput {
    Point(Location),
    External(Geometry),
}

impl From<Location> for LocationInput {
    fn from(loc: Location) -> Self {
        LocationInput::Point(loc)
    }
}

impl From<Geometry> for LocationInput {
    fn from(geom: Geometry) -> Self {
        LocationInput::External(geom)
    }
}

impl From<(f64, f64)> for LocationInput {
    fn from(pair: (f64, f64)) -> Self {
        LocationInput::Point(pair.into())
    }
}

/// Reference system service used to bring external geometries into EPSG:4326.
pub trait Reprojector: Send + Sync {
    fn reproject(&self, x: f64, y: f64, from: Crs, to: Crs) -> Result<(f64, f64)>;
}

/// Spherical Web Mercator (EPSG:3857) to and from geographic coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude of the geographic poles
pub const MAX_LATITUDE: f64 = 90.0;

/// Latitude where Web Mercator's square extent ends
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

impl Reprojector for WebMercator {
    fn reproject(&self, x: f64, y: f64, from: Crs, to: Crs) -> Result<(f64, f64)> {
        match (from, to) {
            (a, b) if a == b => Ok((x, y)),
            (Crs::EPSG_3857, Crs::EPSG_4326) => {
                let lon = (x / EARTH_RADIUS).to_degrees();
                let lat = (y / EARTH_RADIUS).sinh().atan().to_degrees();
                Ok((lon, lat))
            }
            (Crs::EPSG_4326, Crs::EPSG_3857) => {
                let mx = x.to_radians() * EARTH_RADIUS;
                let my = y.to_radians().tan().asinh() * EARTH_RADIUS;
                Ok((mx, my))
            }
            (a, b) => Err(GridError::Reprojection(format!(
                "No transform from {} to {}",
                a, b
            ))),
        }
    }
}

/// Normalizes one location input into EPSG:4326.
pub fn normalize_location(input: &LocationInput, reprojector: &dyn Reprojector) -> Result<Location> {
    let location = match input {
        LocationInput::Point(loc) => *loc,
        LocationInput::External(geom) => {
            let (x, y) = geom.point_coords()?;
            if geom.crs == Crs::EPSG_4326 {
                Location::new(x, y)
            } else {
                let (lon, lat) = reprojector.reproject(x, y, geom.crs, Crs::EPSG_4326)?;
                Location::new(lon, lat)
            }
        }
    };
    if !location.lon.is_finite() || !location.lat.is_finite() {
        return Err(GridError::UnrecognizedLocationType(format!(
            "non-finite coordinates ({})",
            location
        )));
    }
    Ok(location)
}

/// Normalizes a single input or any finite sequence of inputs into a list of locations.
///
/// Lazy sequences are materialized first. Each element is validated on its own tag.
pub fn normalize_locations<I>(inputs: I, reprojector: &dyn Reprojector) -> Result<Vec<Location>>
where
    I: IntoIterator,
    I::Item: Into<LocationInput>,
{
    let inputs: Vec<LocationInput> = inputs.into_iter().map(Into::into).collect();
    inputs
        .iter()
        .map(|input| normalize_location(input, reprojector))
        .collect()
}
