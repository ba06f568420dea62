//! Presence/background model evaluation.
//!
//! Predicted suitability is sampled at the held-out presence points and
//! at random background (pseudo-absence) points; sweeping a threshold
//! over the scores gives the ROC curve, and the trapezoidal integral of
//! that curve the AUC summary statistic.

use crate::errors::{SdmError, SdmResult};
use crate::raster::Raster;
use crate::sampling::sample_background;
use crate::spatial::Coordinate;
use rand::rngs::StdRng;
use serde::Serialize;

/// One point on the ROC curve.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

/// The discrimination curve and its area-under-curve summary.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub roc: Vec<RocPoint>,
    pub auc: f64,
    pub n_presence: usize,
    pub n_background: usize,
}

/// Sample predicted values at a set of coordinates, keeping only
/// points that fall on finite cells.
pub fn sample_scores(suitability: &Raster, coords: &[Coordinate]) -> Vec<f64> {
    coords
        .iter()
        .filter_map(|c| suitability.value_at(*c))
        .filter(|v| v.is_finite())
        .collect()
}

/// Build the ROC curve for presence scores against background scores.
///
/// Thresholds sweep the observed score values from high to low, so the
/// curve runs from (0, 0) to (1, 1); AUC is its trapezoidal integral
/// and is bounded in [0, 1].
pub fn roc_curve(presence: &[f64], background: &[f64]) -> SdmResult<EvaluationResult> {
    if presence.is_empty() {
        return Err(SdmError::EmptySample("no presence scores".to_string()));
    }
    if background.is_empty() {
        return Err(SdmError::EmptySample("no background scores".to_string()));
    }

    let mut thresholds: Vec<f64> = presence.iter().chain(background).copied().collect();
    thresholds.sort_by(|a, b| b.partial_cmp(a).expect("scores must not be NaN"));
    thresholds.dedup();

    let np = presence.len() as f64;
    let nb = background.len() as f64;
    let mut roc = Vec::with_capacity(thresholds.len() + 1);
    roc.push(RocPoint {
        threshold: f64::INFINITY,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    });
    for t in thresholds {
        let tpr = presence.iter().filter(|&&s| s >= t).count() as f64 / np;
        let fpr = background.iter().filter(|&&s| s >= t).count() as f64 / nb;
        roc.push(RocPoint {
            threshold: t,
            false_positive_rate: fpr,
            true_positive_rate: tpr,
        });
    }

    let auc = roc
        .windows(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            (b.false_positive_rate - a.false_positive_rate)
                * (a.true_positive_rate + b.true_positive_rate)
                / 2.0
        })
        .sum();

    Ok(EvaluationResult {
        roc,
        auc,
        n_presence: presence.len(),
        n_background: background.len(),
    })
}

/// Evaluate a suitability raster against held-out presences.
///
/// Background points are drawn from the valid cells of `mask` using the
/// provided generator (seeded by the caller, so the evaluation score is
/// reproducible).
pub fn evaluate(
    suitability: &Raster,
    evaluation: &[Coordinate],
    mask: &Raster,
    n_background: usize,
    rng: &mut StdRng,
) -> SdmResult<EvaluationResult> {
    let presence = sample_scores(suitability, evaluation);
    let background_points = sample_background(mask, n_background, rng)?;
    let background = sample_scores(suitability, &background_points);
    roc_curve(&presence, &background)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Extent;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    #[test]
    fn perfectly_separated_scores_give_auc_one() {
        let presence = vec![0.8, 0.9, 0.95];
        let background = vec![0.1, 0.2, 0.3];
        let result = roc_curve(&presence, &background).unwrap();
        assert_relative_eq!(result.auc, 1.0);
    }

    #[test]
    fn inverted_scores_give_auc_zero() {
        let presence = vec![0.1, 0.2];
        let background = vec![0.8, 0.9];
        let result = roc_curve(&presence, &background).unwrap();
        assert_relative_eq!(result.auc, 0.0);
    }

    #[test]
    fn identical_distributions_give_auc_about_half() {
        let mut rng = StdRng::seed_from_u64(17);
        let presence: Vec<f64> = (0..500).map(|_| rng.gen::<f64>()).collect();
        let background: Vec<f64> = (0..500).map(|_| rng.gen::<f64>()).collect();
        let result = roc_curve(&presence, &background).unwrap();
        assert!(result.auc > 0.45 && result.auc < 0.55, "auc = {}", result.auc);
    }

    #[test]
    fn auc_is_bounded() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..10 {
            let presence: Vec<f64> = (0..50).map(|_| rng.gen::<f64>()).collect();
            let background: Vec<f64> = (0..50).map(|_| rng.gen::<f64>().powi(2)).collect();
            let result = roc_curve(&presence, &background).unwrap();
            assert!((0.0..=1.0).contains(&result.auc));
        }
    }

    #[test]
    fn curve_runs_from_origin_to_one_one() {
        let result = roc_curve(&[0.7, 0.3], &[0.5, 0.2]).unwrap();
        let first = result.roc.first().unwrap();
        let last = result.roc.last().unwrap();
        assert_relative_eq!(first.false_positive_rate, 0.0);
        assert_relative_eq!(first.true_positive_rate, 0.0);
        assert_relative_eq!(last.false_positive_rate, 1.0);
        assert_relative_eq!(last.true_positive_rate, 1.0);
    }

    #[test]
    fn empty_samples_are_rejected() {
        assert!(matches!(
            roc_curve(&[], &[0.5]),
            Err(SdmError::EmptySample(_))
        ));
        assert!(matches!(
            roc_curve(&[0.5], &[]),
            Err(SdmError::EmptySample(_))
        ));
    }

    #[test]
    fn evaluate_scores_presences_against_background() {
        // suitability high in the west, low in the east
        let data = ndarray::Array2::from_shape_fn((10, 10), |(_, col)| 1.0 - col as f64 / 10.0);
        let suitability = Raster::new(data, Extent::new(0.0, 10.0, 0.0, 10.0));
        // held-out presences in the high-suitability west
        let evaluation: Vec<Coordinate> =
            (0..5).map(|i| Coordinate::new(0.5, i as f64 + 0.5)).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let result = evaluate(&suitability, &evaluation, &suitability, 200, &mut rng).unwrap();
        assert_eq!(result.n_presence, 5);
        assert_eq!(result.n_background, 200);
        // presences sit at the top of the score range
        assert!(result.auc > 0.8, "auc = {}", result.auc);
    }
}
