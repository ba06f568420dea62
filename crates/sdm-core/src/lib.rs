//! Core pipeline for projecting a species distribution under current
//! and future climate.
//!
//! The pipeline is a single-threaded batch process: acquire occurrence
//! records, delimit a study area, fetch two bioclimatic raster stacks,
//! fit a presence-only model, evaluate it against held-out presences
//! and random background points, project it onto the future stack, and
//! difference the two projections. Rendering lives in `sdm-report`.

pub mod errors;
pub mod evaluation;
pub mod geotiff;
pub mod model;
pub mod occurrence;
pub mod pipeline;
pub mod raster;
pub mod sampling;
pub mod sources;
pub mod spatial;
pub mod stack;
