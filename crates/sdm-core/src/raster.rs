//! Single-band rasters on a regular longitude/latitude grid.
//!
//! Cells are stored row-major with row 0 at the northern edge, matching
//! the layout of the decoded GeoTIFFs. `NaN` marks missing cells and is
//! propagated by every cell-wise operation.

use crate::errors::{SdmError, SdmResult};
use crate::spatial::{Coordinate, Extent};
use ndarray::{s, Array2};
use std::ops::Range;

/// Locate the cell containing a coordinate, or `None` if it falls
/// outside the extent. Coordinates exactly on the east/south border map
/// to the last cell in that direction.
pub(crate) fn cell_index(
    shape: (usize, usize),
    extent: &Extent,
    coord: Coordinate,
) -> Option<(usize, usize)> {
    if !extent.contains(coord) {
        return None;
    }
    let (nrows, ncols) = shape;
    let dlon = extent.width() / ncols as f64;
    let dlat = extent.height() / nrows as f64;
    let col = (((coord.lon - extent.min_lon) / dlon) as usize).min(ncols - 1);
    let row = (((extent.max_lat - coord.lat) / dlat) as usize).min(nrows - 1);
    Some((row, col))
}

/// The centre coordinate of a cell.
pub(crate) fn cell_center(shape: (usize, usize), extent: &Extent, row: usize, col: usize) -> Coordinate {
    let (nrows, ncols) = shape;
    let dlon = extent.width() / ncols as f64;
    let dlat = extent.height() / nrows as f64;
    Coordinate::new(
        extent.min_lon + (col as f64 + 0.5) * dlon,
        extent.max_lat - (row as f64 + 0.5) * dlat,
    )
}

/// Compute the cell-aligned window covering `target`, together with the
/// exact extent of that window.
pub(crate) fn crop_window(
    shape: (usize, usize),
    extent: &Extent,
    target: &Extent,
) -> SdmResult<(Range<usize>, Range<usize>, Extent)> {
    let overlap = extent.intersection(target).ok_or_else(|| {
        SdmError::GridMismatch(format!(
            "crop target {target:?} does not overlap raster extent {extent:?}"
        ))
    })?;
    let (nrows, ncols) = shape;
    let dlon = extent.width() / ncols as f64;
    let dlat = extent.height() / nrows as f64;

    let col_start = ((overlap.min_lon - extent.min_lon) / dlon).floor() as usize;
    let col_end = (((overlap.max_lon - extent.min_lon) / dlon).ceil() as usize).min(ncols);
    let row_start = ((extent.max_lat - overlap.max_lat) / dlat).floor() as usize;
    let row_end = (((extent.max_lat - overlap.min_lat) / dlat).ceil() as usize).min(nrows);

    let cropped = Extent::new(
        extent.min_lon + col_start as f64 * dlon,
        extent.min_lon + col_end as f64 * dlon,
        extent.max_lat - row_end as f64 * dlat,
        extent.max_lat - row_start as f64 * dlat,
    );
    Ok((row_start..row_end, col_start..col_end, cropped))
}

/// A single-band raster: a 2D grid of values georeferenced by an extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    data: Array2<f64>,
    extent: Extent,
}

impl Raster {
    pub fn new(data: Array2<f64>, extent: Extent) -> Self {
        Self { data, extent }
    }

    /// A raster filled with one value. Mostly useful in tests and fakes.
    pub fn constant(value: f64, extent: Extent, shape: (usize, usize)) -> Self {
        Self::new(Array2::from_elem(shape, value), extent)
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// (cell width, cell height) in degrees.
    pub fn cell_size(&self) -> (f64, f64) {
        let (nrows, ncols) = self.shape();
        (
            self.extent.width() / ncols as f64,
            self.extent.height() / nrows as f64,
        )
    }

    pub fn index_of(&self, coord: Coordinate) -> Option<(usize, usize)> {
        cell_index(self.shape(), &self.extent, coord)
    }

    /// The centre coordinate of a cell.
    pub fn coord_of(&self, row: usize, col: usize) -> Coordinate {
        cell_center(self.shape(), &self.extent, row, col)
    }

    /// The value of the cell containing `coord`, or `None` outside the
    /// extent. A missing cell yields `Some(NaN)`.
    pub fn value_at(&self, coord: Coordinate) -> Option<f64> {
        self.index_of(coord).map(|(row, col)| self.data[[row, col]])
    }

    /// Crop to the cell-aligned window covering `target`.
    pub fn crop(&self, target: &Extent) -> SdmResult<Raster> {
        let (rows, cols, extent) = crop_window(self.shape(), &self.extent, target)?;
        let data = self.data.slice(s![rows, cols]).to_owned();
        Ok(Raster::new(data, extent))
    }

    /// Minimum and maximum over the finite cells, or `None` if every
    /// cell is missing.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for &v in self.data.iter().filter(|v| v.is_finite()) {
            range = Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
        range
    }

    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Number of finite cells with value >= `threshold`.
    pub fn count_at_least(&self, threshold: f64) -> usize {
        self.data
            .iter()
            .filter(|v| v.is_finite() && **v >= threshold)
            .count()
    }

    /// Cell-wise `future - current`.
    ///
    /// Both rasters must share one grid; a missing cell in either input
    /// yields a missing cell in the output.
    pub fn difference(future: &Raster, current: &Raster) -> SdmResult<Raster> {
        if future.shape() != current.shape() || future.extent != current.extent {
            return Err(SdmError::GridMismatch(format!(
                "cannot difference rasters with shapes {:?}/{:?} and extents {:?}/{:?}",
                future.shape(),
                current.shape(),
                future.extent,
                current.extent
            )));
        }
        Ok(Raster::new(&future.data - &current.data, future.extent))
    }

    /// Classify each finite cell as 1 (value >= threshold) or 0.
    /// Missing cells stay missing.
    pub fn binarize(&self, threshold: f64) -> Raster {
        let data = self.data.mapv(|v| {
            if v.is_nan() {
                f64::NAN
            } else if v >= threshold {
                1.0
            } else {
                0.0
            }
        });
        Raster::new(data, self.extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    fn unit_extent() -> Extent {
        Extent::new(0.0, 4.0, 0.0, 4.0)
    }

    #[test]
    fn value_lookup_row_zero_is_north() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let raster = Raster::new(data, unit_extent());
        // (0.5, 3.5) is in the north-west cell
        assert_eq!(raster.value_at(Coordinate::new(0.5, 3.5)), Some(1.0));
        assert_eq!(raster.value_at(Coordinate::new(3.5, 0.5)), Some(4.0));
        assert_eq!(raster.value_at(Coordinate::new(10.0, 0.5)), None);
    }

    #[test]
    fn border_coordinates_map_to_last_cell() {
        let raster = Raster::constant(1.0, unit_extent(), (2, 2));
        assert_eq!(raster.index_of(Coordinate::new(4.0, 0.0)), Some((1, 1)));
        assert_eq!(raster.index_of(Coordinate::new(0.0, 4.0)), Some((0, 0)));
    }

    #[test]
    fn coord_of_is_cell_center() {
        let raster = Raster::constant(0.0, unit_extent(), (2, 2));
        let c = raster.coord_of(0, 0);
        assert!(is_close!(c.lon, 1.0));
        assert!(is_close!(c.lat, 3.0));
    }

    #[test]
    fn crop_is_cell_aligned_and_contains_target() {
        let raster = Raster::constant(1.0, Extent::new(-180.0, 180.0, -90.0, 90.0), (180, 360));
        let target = Extent::new(-89.2, -78.5, 4.8, 15.3);
        let cropped = raster.crop(&target).unwrap();
        let extent = cropped.extent();
        assert!(extent.min_lon <= target.min_lon);
        assert!(extent.max_lon >= target.max_lon);
        assert!(extent.min_lat <= target.min_lat);
        assert!(extent.max_lat >= target.max_lat);
        // 1-degree cells: 10.5 degrees of latitude and 10.7 of longitude
        // expand to a 12 x 12 cell-aligned window
        assert_eq!(cropped.shape(), (12, 12));
    }

    #[test]
    fn crop_outside_extent_fails() {
        let raster = Raster::constant(1.0, unit_extent(), (4, 4));
        let target = Extent::new(10.0, 12.0, 10.0, 12.0);
        assert!(matches!(
            raster.crop(&target),
            Err(SdmError::GridMismatch(_))
        ));
    }

    #[test]
    fn difference_is_cell_wise_and_nan_propagating() {
        let current = Raster::new(array![[0.5, f64::NAN], [0.2, 0.9]], unit_extent());
        let future = Raster::new(array![[0.2, 0.8], [f64::NAN, 0.6]], unit_extent());
        let diff = Raster::difference(&future, &current).unwrap();
        assert!(is_close!(diff.data()[[0, 0]], -0.3));
        assert!(diff.data()[[0, 1]].is_nan());
        assert!(diff.data()[[1, 0]].is_nan());
        assert!(is_close!(diff.data()[[1, 1]], -0.3));
    }

    #[test]
    fn difference_requires_matching_grids() {
        let a = Raster::constant(1.0, unit_extent(), (2, 2));
        let b = Raster::constant(1.0, unit_extent(), (3, 3));
        assert!(matches!(
            Raster::difference(&a, &b),
            Err(SdmError::GridMismatch(_))
        ));
    }

    #[test]
    fn binarize_constant_raster() {
        let raster = Raster::constant(0.8, unit_extent(), (3, 3));
        let binary = raster.binarize(0.5);
        assert!(binary.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn binarize_keeps_missing_cells_missing() {
        let raster = Raster::new(array![[0.8, f64::NAN]], unit_extent());
        let binary = raster.binarize(0.5);
        assert_eq!(binary.data()[[0, 0]], 1.0);
        assert!(binary.data()[[0, 1]].is_nan());
    }

    #[test]
    fn binarize_is_monotonic_in_threshold() {
        let raster = Raster::new(
            array![[0.1, 0.3, 0.5], [0.7, 0.9, f64::NAN]],
            unit_extent(),
        );
        let mut last = usize::MAX;
        for threshold in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
            let ones = raster.binarize(threshold).count_at_least(1.0);
            assert!(ones <= last);
            last = ones;
        }
    }

    #[test]
    fn min_max_ignores_missing_cells() {
        let raster = Raster::new(array![[0.2, f64::NAN], [0.9, 0.4]], unit_extent());
        assert_eq!(raster.min_max(), Some((0.2, 0.9)));
        let empty = Raster::constant(f64::NAN, unit_extent(), (2, 2));
        assert_eq!(empty.min_max(), None);
    }
}
