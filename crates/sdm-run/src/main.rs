//! Single-shot batch run: fetch, fit, project, render.
//!
//! All parameters are fixed below; there are no CLI flags and no
//! environment configuration, only `RUST_LOG` for log filtering. Any
//! stage failure aborts the run with a nonzero exit.

use anyhow::Context;
use log::info;
use sdm_core::pipeline::{run_pipeline, PipelineParams};
use sdm_core::sources::{FutureScenario, GbifSource, WorldClimSource};
use sdm_report::render_report;
use std::path::PathBuf;

fn params() -> PipelineParams {
    let out_dir = PathBuf::from("output");
    PipelineParams {
        species: "Pharomachrus mocinno".to_string(),
        record_limit: 300,
        offset_deg: 5.0,
        resolution_arcmin: 10,
        scenario: FutureScenario {
            scenario: "ssp585".to_string(),
            gcm: "EC-Earth3-Veg".to_string(),
            period: "2041-2060".to_string(),
        },
        train_fraction: 0.7,
        split_seed: 42,
        background_seed: 1234,
        n_background: 1000,
        suitability_threshold: 0.5,
        difference_threshold: 0.0,
        occurrence_path: out_dir.join("occurrences.csv"),
        climate_dir: out_dir.join("climate"),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let params = params();
    let out_dir = PathBuf::from("output");
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let occurrences = GbifSource::new()?;
    let climate = WorldClimSource::new()?;

    let outputs = run_pipeline(&params, &occurrences, &climate)?;
    info!(
        "model evaluated at AUC = {:.3} on {} evaluation presences",
        outputs.evaluation.auc, outputs.evaluation.n_presence
    );

    let report = render_report(&params, &outputs, &out_dir)?;
    info!("done: {}", report.display());
    Ok(())
}
