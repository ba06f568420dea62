//! Stage sequencing for a single batch run.
//!
//! The pipeline is an ordered set of stages, each consuming the typed
//! output of the previous one plus an explicit capability handle (an
//! occurrence source, a climate source, a seeded RNG). Nothing is
//! retried and nothing is cached beyond the occurrence CSV and the
//! climate download directory; any stage failure aborts the run.

use crate::errors::{SdmError, SdmResult};
use crate::evaluation::{evaluate, EvaluationResult};
use crate::model::ClimateEnvelope;
use crate::occurrence::{load_occurrences, write_occurrences, OccurrenceCollection};
use crate::raster::Raster;
use crate::sampling::{dedup_coordinates, split_samples, SampleSplit};
use crate::sources::{ClimateRequest, ClimateSource, FutureScenario, OccurrenceQuery, OccurrenceSource};
use crate::spatial::{study_area, Extent};
use crate::stack::ClimateStack;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// Fixed parameters of a run.
///
/// These are constants compiled into the run binary; the pipeline has
/// no CLI flags and no environment configuration.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Target species, scientific name.
    pub species: String,
    /// Maximum occurrence records to acquire.
    pub record_limit: usize,
    /// Study-area padding around the occurrence bounds, in degrees.
    pub offset_deg: f64,
    /// Climate grid resolution in arc-minutes.
    pub resolution_arcmin: u32,
    /// Future projection to compare against.
    pub scenario: FutureScenario,
    /// Fraction of unique coordinates used for training.
    pub train_fraction: f64,
    /// Seed for the train/evaluation split.
    pub split_seed: u64,
    /// Seed for background-point generation, separate from the split
    /// seed so both are independently reproducible.
    pub background_seed: u64,
    /// Number of background (pseudo-absence) points for evaluation.
    pub n_background: usize,
    /// Binarization threshold for the suitability rasters.
    pub suitability_threshold: f64,
    /// Binarization threshold for the difference raster. The difference
    /// lives on roughly [-1, 1] rather than [0, 1], so it gets its own
    /// threshold; 0.0 reads as "cells that gained suitability".
    pub difference_threshold: f64,
    /// Where the raw occurrence table is persisted.
    pub occurrence_path: PathBuf,
    /// Download cache for climate files.
    pub climate_dir: PathBuf,
}

/// Everything the run produces, in creation order.
#[derive(Debug)]
pub struct PipelineOutputs {
    pub occurrences: OccurrenceCollection,
    pub area: Extent,
    pub current: ClimateStack,
    pub future: ClimateStack,
    pub split: SampleSplit,
    pub model: ClimateEnvelope,
    pub suitability_current: Raster,
    pub suitability_future: Raster,
    pub difference: Raster,
    pub binary_current: Raster,
    pub binary_future: Raster,
    pub binary_difference: Raster,
    pub evaluation: EvaluationResult,
}

/// Query the occurrence source and persist the raw results.
///
/// One write, overwriting any previous file.
pub fn acquire_occurrences(
    source: &dyn OccurrenceSource,
    query: &OccurrenceQuery,
    path: &Path,
) -> SdmResult<usize> {
    let records = source.fetch(query)?;
    write_occurrences(path, &records)?;
    info!("persisted {} records to {}", records.len(), path.display());
    Ok(records.len())
}

/// Run every stage in order.
pub fn run_pipeline(
    params: &PipelineParams,
    occurrence_source: &dyn OccurrenceSource,
    climate_source: &dyn ClimateSource,
) -> SdmResult<PipelineOutputs> {
    info!("stage: occurrence acquisition");
    let query = OccurrenceQuery::new(&params.species, params.record_limit);
    acquire_occurrences(occurrence_source, &query, &params.occurrence_path)?;

    info!("stage: occurrence loading");
    let occurrences = load_occurrences(&params.occurrence_path)?;
    info!("loaded {} georeferenced occurrences", occurrences.len());

    info!("stage: study-area delimitation");
    let area = study_area(&occurrences.coordinates(), params.offset_deg)?;

    info!("stage: climate acquisition (current)");
    let request = ClimateRequest::bioclim(params.resolution_arcmin, params.climate_dir.clone());
    let current = climate_source.fetch_current(&request, &area)?;

    info!("stage: climate acquisition (future)");
    let mut future = climate_source.fetch_future(&request, &params.scenario, &area)?;
    if future.shape() != current.shape() || future.extent() != current.extent() {
        return Err(SdmError::GridMismatch(format!(
            "current and future stacks disagree: {:?}/{:?} vs {:?}/{:?}",
            current.shape(),
            current.extent(),
            future.shape(),
            future.extent()
        )));
    }

    info!("stage: sampling split");
    let unique = dedup_coordinates(&occurrences.coordinates());
    info!("{} unique coordinates", unique.len());
    let mut split_rng = StdRng::seed_from_u64(params.split_seed);
    let split = split_samples(&unique, params.train_fraction, &mut split_rng)?;
    info!(
        "split into {} training / {} evaluation",
        split.training.len(),
        split.evaluation.len()
    );

    info!("stage: model fit");
    let model = ClimateEnvelope::fit(&current, &split.training)?;

    info!("stage: prediction (current)");
    let suitability_current = model.predict(&current)?;

    info!("stage: evaluation");
    let mut background_rng = StdRng::seed_from_u64(params.background_seed);
    let evaluation = evaluate(
        &suitability_current,
        &split.evaluation,
        &suitability_current,
        params.n_background,
        &mut background_rng,
    )?;
    info!("AUC = {:.3}", evaluation.auc);

    info!("stage: prediction (future)");
    // reconcile band names before cross-applying the model
    future.rename_bands(&model.band_names().iter().map(String::as_str).collect::<Vec<_>>())?;
    let suitability_future = model.predict(&future)?;

    info!("stage: difference computation");
    let difference = Raster::difference(&suitability_future, &suitability_current)?;
    let binary_current = suitability_current.binarize(params.suitability_threshold);
    let binary_future = suitability_future.binarize(params.suitability_threshold);
    let binary_difference = difference.binarize(params.difference_threshold);

    Ok(PipelineOutputs {
        occurrences,
        area,
        current,
        future,
        split,
        model,
        suitability_current,
        suitability_future,
        difference,
        binary_current,
        binary_future,
        binary_difference,
        evaluation,
    })
}
