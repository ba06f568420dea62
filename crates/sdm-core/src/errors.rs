use std::path::PathBuf;
use thiserror::Error;

/// Error type for pipeline failures.
///
/// Every stage failure is fatal: there is no retry policy and no
/// partial-result recovery, so the run binary logs the error and stops,
/// leaving downstream report sections unrendered.
#[derive(Error, Debug)]
pub enum SdmError {
    /// The occurrence or climate source could not be reached or answered
    /// with an error. Network and API failures both land here.
    #[error("acquisition failed: {0}")]
    AcquisitionFailed(String),
    #[error("missing file: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("parse error at row {row}: {message}")]
    ParseError { row: usize, message: String },
    /// No occurrence points to delimit a study area from.
    #[error("no occurrence data")]
    NoData,
    #[error("insufficient data: {n} samples, need at least {min}")]
    InsufficientData { n: usize, min: usize },
    /// A model was applied to a stack whose band set does not match the
    /// band set it was fitted on.
    #[error("band mismatch: expected {expected:?}, got {actual:?}")]
    BandMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("empty sample: {0}")]
    EmptySample(String),
    /// Two rasters that must share a grid (shape and extent) do not,
    /// or a crop window does not overlap the raster.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),
    #[error("unsupported pixel format in GeoTIFF")]
    UnsupportedPixelFormat,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("tiff decoding error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Convenience type for `Result<T, SdmError>`.
pub type SdmResult<T> = Result<T, SdmError>;
