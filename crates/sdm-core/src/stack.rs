//! Multi-band climate stacks.
//!
//! A [`ClimateStack`] is an ordered set of named bioclimatic bands
//! sharing one grid and extent. Two instances flow through the pipeline
//! (current and future climate); their band names must be reconciled
//! before the fitted model can be applied to the future stack.

use crate::errors::{SdmError, SdmResult};
use crate::raster::{cell_index, crop_window, Raster};
use crate::spatial::{Coordinate, Extent};
use indexmap::IndexMap;
use ndarray::{s, Array2};

/// An ordered collection of named raster bands on a common grid.
#[derive(Debug, Clone)]
pub struct ClimateStack {
    bands: IndexMap<String, Array2<f64>>,
    extent: Extent,
}

impl ClimateStack {
    /// Build a stack from named bands.
    ///
    /// All bands must share one shape and names must be unique.
    pub fn from_bands(bands: Vec<(String, Array2<f64>)>, extent: Extent) -> SdmResult<Self> {
        let mut map = IndexMap::with_capacity(bands.len());
        let mut shape = None;
        for (name, band) in bands {
            match shape {
                None => shape = Some(band.dim()),
                Some(expected) if band.dim() != expected => {
                    return Err(SdmError::GridMismatch(format!(
                        "band {} has shape {:?}, expected {:?}",
                        name,
                        band.dim(),
                        expected
                    )));
                }
                Some(_) => {}
            }
            if map.insert(name.clone(), band).is_some() {
                return Err(SdmError::GridMismatch(format!("duplicate band name {name}")));
            }
        }
        if map.is_empty() {
            return Err(SdmError::GridMismatch("a stack needs at least one band".into()));
        }
        Ok(Self { bands: map, extent })
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.keys().map(String::as_str).collect()
    }

    pub fn band(&self, name: &str) -> Option<&Array2<f64>> {
        self.bands.get(name)
    }

    /// One band as a standalone georeferenced raster.
    pub fn band_raster(&self, name: &str) -> Option<Raster> {
        self.bands
            .get(name)
            .map(|band| Raster::new(band.clone(), self.extent))
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    /// (rows, cols), shared by every band.
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Crop every band to the cell-aligned window covering `target`.
    pub fn crop(&self, target: &Extent) -> SdmResult<ClimateStack> {
        let (rows, cols, extent) = crop_window(self.shape(), &self.extent, target)?;
        let bands = self
            .bands
            .iter()
            .map(|(name, band)| {
                (
                    name.clone(),
                    band.slice(s![rows.clone(), cols.clone()]).to_owned(),
                )
            })
            .collect();
        Ok(Self { bands, extent })
    }

    /// Rename bands positionally.
    ///
    /// This is the reconciliation step before cross-applying a model:
    /// the future stack's bands are renamed to the names of the stack
    /// the model was fitted on. Band order is preserved.
    pub fn rename_bands(&mut self, names: &[&str]) -> SdmResult<()> {
        if names.len() != self.bands.len() {
            return Err(SdmError::BandMismatch {
                expected: names.iter().map(|s| s.to_string()).collect(),
                actual: self.bands.keys().cloned().collect(),
            });
        }
        let renamed = names
            .iter()
            .map(|s| s.to_string())
            .zip(self.bands.drain(..).map(|(_, band)| band))
            .collect();
        self.bands = renamed;
        Ok(())
    }

    /// The per-band values of the cell containing `coord`, in stack
    /// band order. `None` outside the extent or where any band is
    /// missing.
    pub fn features_at(&self, coord: Coordinate) -> Option<Vec<f64>> {
        let (row, col) = cell_index(self.shape(), &self.extent, coord)?;
        let features: Vec<f64> = self.bands.values().map(|band| band[[row, col]]).collect();
        if features.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(features)
    }
}
