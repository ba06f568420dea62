//! Occurrence records and their persisted tabular form.
//!
//! Acquisition writes the raw API records to a single CSV file;
//! loading reads that file back into a geometry-bearing collection in
//! [`crate::spatial::CRS`]. The CSV header uses the Darwin Core field
//! names returned by the API, so one struct round-trips through both.

use crate::errors::{SdmError, SdmResult};
use crate::spatial::{Coordinate, Extent};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One species sighting as returned by the occurrence API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    #[serde(rename = "decimalLongitude")]
    pub decimal_longitude: Option<f64>,
    #[serde(rename = "decimalLatitude")]
    pub decimal_latitude: Option<f64>,
    #[serde(rename = "scientificName")]
    pub scientific_name: String,
    #[serde(rename = "dateIdentified", default)]
    pub date_identified: Option<String>,
    #[serde(rename = "occurrenceID", default)]
    pub occurrence_id: Option<String>,
    #[serde(rename = "basisOfRecord", default)]
    pub basis_of_record: Option<String>,
    #[serde(rename = "countryCode", default)]
    pub country_code: Option<String>,
}

impl OccurrenceRecord {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.decimal_longitude, self.decimal_latitude) {
            (Some(lon), Some(lat)) => Some(Coordinate::new(lon, lat)),
            _ => None,
        }
    }
}

/// A loaded record together with its point geometry.
#[derive(Debug, Clone)]
pub struct OccurrencePoint {
    pub record: OccurrenceRecord,
    pub coord: Coordinate,
}

/// The loaded occurrence table as a point collection in EPSG:4326.
///
/// Immutable once loaded; the rest of the pipeline only derives
/// coordinates from it.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceCollection {
    points: Vec<OccurrencePoint>,
}

impl OccurrenceCollection {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OccurrencePoint> {
        self.points.iter()
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.points.iter().map(|p| p.coord).collect()
    }

    /// Tight bounding box of the points, `None` when empty.
    pub fn bounds(&self) -> Option<Extent> {
        Extent::from_coordinates(&self.coordinates())
    }
}

/// Persist records to `path`, overwriting any previous file.
pub fn write_occurrences(path: &Path, records: &[OccurrenceRecord]) -> SdmResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load the persisted occurrence table.
///
/// Rows with null coordinates are dropped with a warning; structurally
/// malformed rows abort the load with a `ParseError`.
pub fn load_occurrences(path: &Path) -> SdmResult<OccurrenceCollection> {
    if !path.exists() {
        return Err(SdmError::MissingFile(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut points = Vec::new();
    let mut dropped = 0usize;
    for (i, row) in reader.deserialize::<OccurrenceRecord>().enumerate() {
        // +2: 1-based, after the header row
        let record = row.map_err(|e| SdmError::ParseError {
            row: i + 2,
            message: e.to_string(),
        })?;
        match record.coordinate() {
            Some(coord) => points.push(OccurrencePoint { record, coord }),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!("dropped {dropped} occurrence rows with null coordinates");
    }
    Ok(OccurrenceCollection { points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(lon: f64, lat: f64) -> OccurrenceRecord {
        OccurrenceRecord {
            decimal_longitude: Some(lon),
            decimal_latitude: Some(lat),
            scientific_name: "Pharomachrus mocinno".to_string(),
            date_identified: Some("2021-04-03".to_string()),
            occurrence_id: Some("occ-1".to_string()),
            basis_of_record: Some("HUMAN_OBSERVATION".to_string()),
            country_code: Some("CR".to_string()),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("sdm-occurrence-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn csv_round_trip() {
        let path = temp_path("round-trip.csv");
        let records = vec![record(-84.0, 10.0), record(-83.5, 9.8)];
        write_occurrences(&path, &records).unwrap();

        let collection = load_occurrences(&path).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.iter().next().unwrap().record, records[0]);
        assert_eq!(collection.coordinates()[1], Coordinate::new(-83.5, 9.8));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn null_coordinates_are_dropped() {
        let path = temp_path("null-coords.csv");
        let mut incomplete = record(-84.0, 10.0);
        incomplete.decimal_latitude = None;
        write_occurrences(&path, &[record(-84.0, 10.0), incomplete]).unwrap();

        let collection = load_occurrences(&path).unwrap();
        assert_eq!(collection.len(), 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let result = load_occurrences(Path::new("/nonexistent/occurrences.csv"));
        assert!(matches!(result, Err(SdmError::MissingFile(_))));
    }

    #[test]
    fn malformed_row_is_a_parse_error() {
        let path = temp_path("malformed.csv");
        std::fs::write(
            &path,
            "decimalLongitude,decimalLatitude,scientificName,dateIdentified,occurrenceID,basisOfRecord,countryCode\n\
             not-a-number,10.0,Pharomachrus mocinno,,,,\n",
        )
        .unwrap();
        let result = load_occurrences(&path);
        assert!(matches!(result, Err(SdmError::ParseError { row: 2, .. })));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn bounds_cover_all_points() {
        let path = temp_path("bounds.csv");
        write_occurrences(&path, &[record(-84.0, 10.0), record(-83.5, 9.8)]).unwrap();
        let collection = load_occurrences(&path).unwrap();
        let bounds = collection.bounds().unwrap();
        assert_eq!(bounds, Extent::new(-84.0, -83.5, 9.8, 10.0));
        std::fs::remove_file(&path).unwrap();
    }
}
