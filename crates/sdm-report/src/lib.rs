//! Rendering of the analysis document: interactive Leaflet maps,
//! the ROC figure, and the surrounding narrative HTML.

pub mod map;
pub mod ramp;
pub mod report;
pub mod roc;

pub use report::render_report;
