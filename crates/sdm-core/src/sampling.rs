//! Coordinate deduplication, the train/evaluation split, and background
//! point generation.
//!
//! There is no global RNG anywhere in the pipeline: every random step
//! takes an explicitly seeded generator, so the split and the
//! background sample are independently reproducible.

use crate::errors::{SdmError, SdmResult};
use crate::raster::Raster;
use crate::spatial::Coordinate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Below this many unique coordinates, both model fitting and
/// evaluation degrade too far to be meaningful.
pub const MIN_UNIQUE_COORDINATES: usize = 10;

/// Drop duplicate coordinates, keeping first-seen order.
///
/// Idempotent: deduplicating an already-deduplicated set is a no-op.
pub fn dedup_coordinates(coords: &[Coordinate]) -> Vec<Coordinate> {
    let mut seen = HashSet::new();
    coords
        .iter()
        .copied()
        .filter(|c| seen.insert(c.bits()))
        .collect()
}

/// Disjoint training/evaluation partition of the unique coordinates.
#[derive(Debug, Clone)]
pub struct SampleSplit {
    pub training: Vec<Coordinate>,
    pub evaluation: Vec<Coordinate>,
}

/// Randomly partition coordinates into training and evaluation subsets.
///
/// `|training| = round(train_fraction * n)`; the same seed and input
/// order always produce the same partition.
///
/// # Panics
///
/// Panics if `train_fraction` is not strictly between 0 and 1.
pub fn split_samples(
    coords: &[Coordinate],
    train_fraction: f64,
    rng: &mut StdRng,
) -> SdmResult<SampleSplit> {
    assert!(
        train_fraction > 0.0 && train_fraction < 1.0,
        "train_fraction must be in (0, 1), got {train_fraction}"
    );
    let n = coords.len();
    if n < MIN_UNIQUE_COORDINATES {
        return Err(SdmError::InsufficientData {
            n,
            min: MIN_UNIQUE_COORDINATES,
        });
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let n_train = (train_fraction * n as f64).round() as usize;
    let (train_idx, eval_idx) = indices.split_at(n_train);
    Ok(SampleSplit {
        training: train_idx.iter().map(|&i| coords[i]).collect(),
        evaluation: eval_idx.iter().map(|&i| coords[i]).collect(),
    })
}

/// Draw `n` random background (pseudo-absence) points from the valid
/// (non-missing) cells of `mask`, returned as cell centres. Sampling is
/// with replacement.
pub fn sample_background(mask: &Raster, n: usize, rng: &mut StdRng) -> SdmResult<Vec<Coordinate>> {
    if n == 0 {
        return Err(SdmError::EmptySample(
            "background sample count is zero".to_string(),
        ));
    }
    let valid: Vec<(usize, usize)> = mask
        .data()
        .indexed_iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(index, _)| index)
        .collect();
    if valid.is_empty() {
        return Err(SdmError::EmptySample(
            "mask has no valid cells to sample from".to_string(),
        ));
    }
    Ok((0..n)
        .map(|_| {
            let (row, col) = valid[rng.gen_range(0..valid.len())];
            mask.coord_of(row, col)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Extent;
    use ndarray::array;
    use rand::SeedableRng;

    fn coords(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(-84.0 + i as f64 * 0.1, 10.0 - i as f64 * 0.05))
            .collect()
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let mut input = coords(3);
        input.push(input[0]);
        input.push(input[2]);
        let unique = dedup_coordinates(&input);
        assert_eq!(unique, coords(3));
    }

    #[test]
    fn dedup_is_idempotent() {
        let mut input = coords(5);
        input.extend(coords(5));
        let once = dedup_coordinates(&input);
        let twice = dedup_coordinates(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let input = coords(20);
        let a = split_samples(&input, 0.7, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = split_samples(&input, 0.7, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.training, b.training);
        assert_eq!(a.evaluation, b.evaluation);
    }

    #[test]
    fn split_sizes_and_disjointness() {
        let input = coords(21);
        let split = split_samples(&input, 0.7, &mut StdRng::seed_from_u64(7)).unwrap();
        // round(0.7 * 21) = 15
        assert_eq!(split.training.len(), 15);
        assert_eq!(split.evaluation.len(), 6);
        for c in &split.evaluation {
            assert!(!split.training.contains(c));
        }
        // together they cover the input
        let mut all = split.training.clone();
        all.extend_from_slice(&split.evaluation);
        assert_eq!(dedup_coordinates(&all).len(), input.len());
    }

    #[test]
    fn too_few_coordinates_is_insufficient_data() {
        let input = coords(9);
        let result = split_samples(&input, 0.7, &mut StdRng::seed_from_u64(1));
        assert!(matches!(
            result,
            Err(SdmError::InsufficientData { n: 9, min: 10 })
        ));
    }

    #[test]
    #[should_panic]
    fn out_of_range_fraction_panics() {
        let _ = split_samples(&coords(20), 1.5, &mut StdRng::seed_from_u64(1));
    }

    #[test]
    fn background_points_fall_on_valid_cells() {
        let mask = Raster::new(
            array![[1.0, f64::NAN], [f64::NAN, 1.0]],
            Extent::new(0.0, 2.0, 0.0, 2.0),
        );
        let mut rng = StdRng::seed_from_u64(9);
        let points = sample_background(&mask, 50, &mut rng).unwrap();
        assert_eq!(points.len(), 50);
        for p in points {
            let value = mask.value_at(p).unwrap();
            assert!(value.is_finite());
        }
    }

    #[test]
    fn background_sampling_is_reproducible() {
        let mask = Raster::constant(1.0, Extent::new(0.0, 4.0, 0.0, 4.0), (8, 8));
        let a = sample_background(&mask, 20, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = sample_background(&mask, 20, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn all_missing_mask_is_empty_sample() {
        let mask = Raster::constant(f64::NAN, Extent::new(0.0, 1.0, 0.0, 1.0), (2, 2));
        let result = sample_background(&mask, 10, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(SdmError::EmptySample(_))));
    }

    #[test]
    fn zero_count_is_empty_sample() {
        let mask = Raster::constant(1.0, Extent::new(0.0, 1.0, 0.0, 1.0), (2, 2));
        let result = sample_background(&mask, 0, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(SdmError::EmptySample(_))));
    }
}
