//! Presence-only climate envelope model.
//!
//! # What this model does
//!
//! Fitting takes the current-climate stack and the training presences,
//! nothing else: no absence labels exist in a presence-only setting.
//! For each band the mean and spread of the band values at the training
//! presences define a Gaussian response curve, and a cell's suitability
//! is
//!
//! $$s = \exp\left(-\tfrac{1}{2k}\sum_{i=1}^{k} z_i^2\right)$$
//!
//! where $z_i$ is the cell's z-score in band $i$. Scores fall in
//! (0, 1]: 1 at the climatic centroid of the presences, decaying with
//! distance from it in every climate dimension.
//!
//! # Band alignment
//!
//! The model's feature space is fixed by the band set of the stack it
//! was fitted on. Prediction matches bands by *name*, so band order in
//! the target stack does not matter, but a stack whose band set differs
//! from the fit-time set is rejected with `BandMismatch`. The pipeline
//! renames future-stack bands to the fit-time names before projecting.

use crate::errors::{SdmError, SdmResult};
use crate::raster::Raster;
use crate::spatial::Coordinate;
use crate::stack::ClimateStack;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Presences needed for a meaningful per-band spread.
const MIN_PRESENCES: usize = 2;

/// Floor on the per-band spread so constant bands do not divide by zero.
const MIN_SPREAD: f64 = 1e-9;

/// A fitted presence-only climate envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateEnvelope {
    band_names: Vec<String>,
    means: Vec<f64>,
    spreads: Vec<f64>,
    n_presences: usize,
}

impl ClimateEnvelope {
    /// Fit the envelope to the training presences on `stack`.
    ///
    /// Presences falling outside the stack extent or on missing cells
    /// are ignored; fitting fails with `InsufficientData` when fewer
    /// than two usable presences remain.
    pub fn fit(stack: &ClimateStack, training: &[Coordinate]) -> SdmResult<Self> {
        let samples: Vec<Vec<f64>> = training
            .iter()
            .filter_map(|c| stack.features_at(*c))
            .collect();
        if samples.len() < MIN_PRESENCES {
            return Err(SdmError::InsufficientData {
                n: samples.len(),
                min: MIN_PRESENCES,
            });
        }

        let n = samples.len() as f64;
        let k = stack.n_bands();
        let mut means = vec![0.0; k];
        for sample in &samples {
            for (mean, value) in means.iter_mut().zip(sample) {
                *mean += value / n;
            }
        }
        let mut spreads = vec![0.0; k];
        for sample in &samples {
            for ((spread, mean), value) in spreads.iter_mut().zip(&means).zip(sample) {
                *spread += (value - mean).powi(2) / n;
            }
        }
        for spread in &mut spreads {
            *spread = spread.sqrt().max(MIN_SPREAD);
        }

        Ok(Self {
            band_names: stack.band_names().iter().map(|s| s.to_string()).collect(),
            means,
            spreads,
            n_presences: samples.len(),
        })
    }

    /// Band names of the stack the model was fitted on, in fit order.
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Usable presences the fit was based on.
    pub fn n_presences(&self) -> usize {
        self.n_presences
    }

    /// Suitability of a single feature vector given in fit band order.
    pub fn score(&self, features: &[f64]) -> f64 {
        let k = self.band_names.len() as f64;
        let sum_sq: f64 = features
            .iter()
            .zip(&self.means)
            .zip(&self.spreads)
            .map(|((value, mean), spread)| ((value - mean) / spread).powi(2))
            .sum();
        (-0.5 * sum_sq / k).exp()
    }

    /// The stack's bands in fit order, or `BandMismatch` if the band
    /// sets differ.
    fn aligned_bands<'a>(&self, stack: &'a ClimateStack) -> SdmResult<Vec<ArrayView2<'a, f64>>> {
        let mismatch = || SdmError::BandMismatch {
            expected: self.band_names.clone(),
            actual: stack.band_names().iter().map(|s| s.to_string()).collect(),
        };
        if stack.n_bands() != self.band_names.len() {
            return Err(mismatch());
        }
        self.band_names
            .iter()
            .map(|name| stack.band(name).map(|b| b.view()).ok_or_else(|| mismatch()))
            .collect()
    }

    /// Apply the fitted model to every cell of `stack`, producing a
    /// suitability raster on the stack's grid. Cells with any missing
    /// band stay missing.
    pub fn predict(&self, stack: &ClimateStack) -> SdmResult<Raster> {
        let bands = self.aligned_bands(stack)?;
        let (nrows, ncols) = stack.shape();
        let k = self.band_names.len() as f64;
        let mut out = Array2::from_elem((nrows, ncols), f64::NAN);
        for row in 0..nrows {
            for col in 0..ncols {
                let mut sum_sq = 0.0;
                let mut valid = true;
                for (band, (mean, spread)) in
                    bands.iter().zip(self.means.iter().zip(&self.spreads))
                {
                    let value = band[[row, col]];
                    if !value.is_finite() {
                        valid = false;
                        break;
                    }
                    sum_sq += ((value - mean) / spread).powi(2);
                }
                if valid {
                    out[[row, col]] = (-0.5 * sum_sq / k).exp();
                }
            }
        }
        Ok(Raster::new(out, stack.extent()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Extent;
    use is_close::is_close;
    use ndarray::Array2;

    fn extent() -> Extent {
        Extent::new(0.0, 10.0, 0.0, 10.0)
    }

    /// A 10x10 stack with a west-east temperature gradient and a
    /// north-south precipitation gradient.
    fn gradient_stack() -> ClimateStack {
        let temperature = Array2::from_shape_fn((10, 10), |(_, col)| 10.0 + col as f64);
        let precipitation = Array2::from_shape_fn((10, 10), |(row, _)| 500.0 + 50.0 * row as f64);
        ClimateStack::from_bands(
            vec![
                ("bio1".to_string(), temperature),
                ("bio12".to_string(), precipitation),
            ],
            extent(),
        )
        .unwrap()
    }

    fn training() -> Vec<Coordinate> {
        // cluster in the middle of the grid
        vec![
            Coordinate::new(4.5, 4.5),
            Coordinate::new(5.5, 5.5),
            Coordinate::new(4.5, 5.5),
            Coordinate::new(5.5, 4.5),
        ]
    }

    #[test]
    fn fit_records_band_names_in_stack_order() {
        let model = ClimateEnvelope::fit(&gradient_stack(), &training()).unwrap();
        assert_eq!(model.band_names(), ["bio1", "bio12"]);
        assert_eq!(model.n_presences(), 4);
    }

    #[test]
    fn too_few_usable_presences_fails() {
        let result = ClimateEnvelope::fit(&gradient_stack(), &[Coordinate::new(4.5, 4.5)]);
        assert!(matches!(result, Err(SdmError::InsufficientData { .. })));
        // all presences off-grid
        let result = ClimateEnvelope::fit(
            &gradient_stack(),
            &[Coordinate::new(-50.0, -50.0), Coordinate::new(-51.0, -50.0)],
        );
        assert!(matches!(
            result,
            Err(SdmError::InsufficientData { n: 0, .. })
        ));
    }

    #[test]
    fn prediction_is_bounded_and_peaks_at_the_centroid() {
        let stack = gradient_stack();
        let model = ClimateEnvelope::fit(&stack, &training()).unwrap();
        let suitability = model.predict(&stack).unwrap();

        let (min, max) = suitability.min_max().unwrap();
        assert!(min >= 0.0);
        assert!(max <= 1.0);

        // the training centroid sits between the four presences; the
        // nearest cells must score higher than a far corner
        let near = suitability.value_at(Coordinate::new(5.5, 5.5)).unwrap();
        let far = suitability.value_at(Coordinate::new(9.5, 0.5)).unwrap();
        assert!(near > far);
    }

    #[test]
    fn prediction_matches_bands_by_name_not_order() {
        let stack = gradient_stack();
        let model = ClimateEnvelope::fit(&stack, &training()).unwrap();

        // same bands, reversed order
        let reordered = ClimateStack::from_bands(
            vec![
                ("bio12".to_string(), stack.band("bio12").unwrap().clone()),
                ("bio1".to_string(), stack.band("bio1").unwrap().clone()),
            ],
            extent(),
        )
        .unwrap();

        let a = model.predict(&stack).unwrap();
        let b = model.predict(&reordered).unwrap();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn band_set_mismatch_is_rejected() {
        let stack = gradient_stack();
        let model = ClimateEnvelope::fit(&stack, &training()).unwrap();

        let renamed = ClimateStack::from_bands(
            vec![
                ("bioc_1".to_string(), stack.band("bio1").unwrap().clone()),
                ("bioc_2".to_string(), stack.band("bio12").unwrap().clone()),
            ],
            extent(),
        )
        .unwrap();

        assert!(matches!(
            model.predict(&renamed),
            Err(SdmError::BandMismatch { .. })
        ));
    }

    #[test]
    fn missing_cells_stay_missing_in_the_prediction() {
        let mut temperature = Array2::from_elem((2, 2), 15.0);
        temperature[[0, 1]] = f64::NAN;
        let stack = ClimateStack::from_bands(
            vec![("bio1".to_string(), temperature)],
            Extent::new(0.0, 2.0, 0.0, 2.0),
        )
        .unwrap();
        let presences = vec![
            Coordinate::new(0.5, 0.5),
            Coordinate::new(0.5, 1.5),
            Coordinate::new(1.5, 0.5),
        ];
        let model = ClimateEnvelope::fit(&stack, &presences).unwrap();
        let suitability = model.predict(&stack).unwrap();
        assert!(suitability.data()[[0, 1]].is_nan());
        // constant band: every valid cell scores 1
        assert!(is_close!(suitability.data()[[1, 1]], 1.0));
    }
}
