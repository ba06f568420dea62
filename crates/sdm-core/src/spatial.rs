//! Geographic primitives: coordinates and axis-aligned extents.
//!
//! Everything in the pipeline lives in unprojected longitude/latitude
//! ([`CRS`]), matching both the occurrence database and the climate
//! grids, so no reprojection ever happens here.

use crate::errors::{SdmError, SdmResult};
use serde::{Deserialize, Serialize};

/// Coordinate reference system shared by every spatial object in the pipeline.
pub const CRS: &str = "EPSG:4326";

/// A longitude/latitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Bitwise key used for deduplication.
    ///
    /// Occurrence coordinates come from a fixed-precision database, so
    /// exact bit equality is the right notion of "same place".
    pub(crate) fn bits(&self) -> (u64, u64) {
        (self.lon.to_bits(), self.lat.to_bits())
    }
}

/// An axis-aligned rectangle in longitude/latitude.
///
/// Used both for the study area and for raster georeferencing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Extent {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// The whole-globe extent, the native extent of the climate downloads.
    pub fn global() -> Self {
        Self::new(-180.0, 180.0, -90.0, 90.0)
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Whether the coordinate lies within the extent (borders inclusive).
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
            && coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
    }

    /// Grow the extent by `offset` degrees on every side.
    pub fn pad(&self, offset: f64) -> Extent {
        Extent::new(
            self.min_lon - offset,
            self.max_lon + offset,
            self.min_lat - offset,
            self.max_lat + offset,
        )
    }

    /// The overlapping rectangle of two extents, if any.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let min_lon = self.min_lon.max(other.min_lon);
        let max_lon = self.max_lon.min(other.max_lon);
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lat = self.max_lat.min(other.max_lat);
        if min_lon < max_lon && min_lat < max_lat {
            Some(Extent::new(min_lon, max_lon, min_lat, max_lat))
        } else {
            None
        }
    }

    /// The tight bounding rectangle of a set of coordinates.
    ///
    /// Returns `None` for an empty set.
    pub fn from_coordinates(coords: &[Coordinate]) -> Option<Extent> {
        let first = coords.first()?;
        let mut extent = Extent::new(first.lon, first.lon, first.lat, first.lat);
        for c in &coords[1..] {
            extent.min_lon = extent.min_lon.min(c.lon);
            extent.max_lon = extent.max_lon.max(c.lon);
            extent.min_lat = extent.min_lat.min(c.lat);
            extent.max_lat = extent.max_lat.max(c.lat);
        }
        Some(extent)
    }
}

/// Delimit the rectangular study area around a set of occurrence points.
///
/// The area is the tight bounding box of the points padded by
/// `offset_deg` on every side, so every point is contained with margin
/// exactly `offset_deg`. A single point still yields a non-degenerate
/// rectangle as long as the offset is positive.
pub fn study_area(coords: &[Coordinate], offset_deg: f64) -> SdmResult<Extent> {
    let bounds = Extent::from_coordinates(coords).ok_or(SdmError::NoData)?;
    Ok(bounds.pad(offset_deg))
}
