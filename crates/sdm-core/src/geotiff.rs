//! GeoTIFF band decoding.
//!
//! The climate sources deliver plain GeoTIFFs; this reads every image
//! directory of a file into 2D arrays. Values at or below the WorldClim
//! float nodata sentinel become `NaN`.

use crate::errors::{SdmError, SdmResult};
use ndarray::Array2;
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};

/// Anything at or below this is treated as nodata (WorldClim uses
/// -3.4e38 in its float products).
const NODATA_THRESHOLD: f64 = -1.0e30;

/// Read every band (TIFF image directory) of a file.
pub fn read_bands<P: AsRef<Path>>(path: P) -> SdmResult<Vec<Array2<f64>>> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(file)?;
    let mut bands = Vec::new();
    loop {
        let (width, height) = decoder.dimensions()?;
        let band = match decoder.read_image()? {
            DecodingResult::U8(buf) => to_band(buf.into_iter().map(f64::from), width, height)?,
            DecodingResult::U16(buf) => to_band(buf.into_iter().map(f64::from), width, height)?,
            DecodingResult::U32(buf) => to_band(buf.into_iter().map(f64::from), width, height)?,
            DecodingResult::I16(buf) => to_band(buf.into_iter().map(f64::from), width, height)?,
            DecodingResult::I32(buf) => to_band(buf.into_iter().map(f64::from), width, height)?,
            DecodingResult::F32(buf) => to_band(buf.into_iter().map(f64::from), width, height)?,
            DecodingResult::F64(buf) => to_band(buf.into_iter(), width, height)?,
            _ => return Err(SdmError::UnsupportedPixelFormat),
        };
        bands.push(band);
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }
    Ok(bands)
}

fn to_band(
    values: impl Iterator<Item = f64>,
    width: u32,
    height: u32,
) -> SdmResult<Array2<f64>> {
    let data: Vec<f64> = values
        .map(|v| if v <= NODATA_THRESHOLD { f64::NAN } else { v })
        .collect();
    Ok(Array2::from_shape_vec(
        (height as usize, width as usize),
        data,
    )?)
}
