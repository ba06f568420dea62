//! External data sources behind capability traits.
//!
//! Pipeline stages never talk to the network directly: they take an
//! [`OccurrenceSource`] or [`ClimateSource`] handle, so tests can
//! substitute in-memory fakes and the real clients stay in one place.
//! There is deliberately no retry layer; a failed download fails the
//! whole run.

use crate::errors::{SdmError, SdmResult};
use crate::geotiff;
use crate::occurrence::OccurrenceRecord;
use crate::raster::Raster;
use crate::spatial::Extent;
use crate::stack::ClimateStack;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Query for the occurrence search API.
#[derive(Debug, Clone)]
pub struct OccurrenceQuery {
    pub scientific_name: String,
    /// Maximum number of records to fetch across all pages.
    pub limit: usize,
    pub has_coordinate: bool,
    pub exclude_geospatial_issues: bool,
}

impl OccurrenceQuery {
    /// Query with the filters the pipeline always wants: georeferenced
    /// records without known geospatial issues.
    pub fn new(scientific_name: &str, limit: usize) -> Self {
        Self {
            scientific_name: scientific_name.to_string(),
            limit,
            has_coordinate: true,
            exclude_geospatial_issues: true,
        }
    }
}

/// Source of species occurrence records.
pub trait OccurrenceSource {
    fn fetch(&self, query: &OccurrenceQuery) -> SdmResult<Vec<OccurrenceRecord>>;
}

/// Identifies a future-climate projection.
#[derive(Debug, Clone)]
pub struct FutureScenario {
    /// Emissions pathway, e.g. "ssp585".
    pub scenario: String,
    /// Global climate model, e.g. "EC-Earth3-Veg".
    pub gcm: String,
    /// Time window, e.g. "2041-2060".
    pub period: String,
}

/// Request shared by the current and future climate fetches.
#[derive(Debug, Clone)]
pub struct ClimateRequest {
    /// Band names, in the order they should appear in the stack.
    pub variables: Vec<String>,
    /// Spatial resolution in arc-minutes.
    pub resolution_arcmin: u32,
    /// Where downloaded files are kept.
    pub cache_dir: PathBuf,
}

impl ClimateRequest {
    /// The 19 standard bioclimatic variables.
    pub fn bioclim(resolution_arcmin: u32, cache_dir: PathBuf) -> Self {
        Self {
            variables: (1..=19).map(|i| format!("bio{i}")).collect(),
            resolution_arcmin,
            cache_dir,
        }
    }
}

/// Source of multi-band climate raster stacks, cropped to a study area.
pub trait ClimateSource {
    fn fetch_current(&self, request: &ClimateRequest, area: &Extent) -> SdmResult<ClimateStack>;
    fn fetch_future(
        &self,
        request: &ClimateRequest,
        scenario: &FutureScenario,
        area: &Extent,
    ) -> SdmResult<ClimateStack>;
}

/// Server-side maximum page size of the occurrence search API.
const PAGE_LIMIT: usize = 300;

/// GBIF-style occurrence search client with offset/limit pagination.
pub struct GbifSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl GbifSource {
    pub fn new() -> SdmResult<Self> {
        Self::with_base_url("https://api.gbif.org/v1")
    }

    pub fn with_base_url(base_url: &str) -> SdmResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SdmError::AcquisitionFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn fetch_page(
        &self,
        query: &OccurrenceQuery,
        offset: usize,
        limit: usize,
    ) -> SdmResult<SearchPage> {
        let url = format!("{}/occurrence/search", self.base_url);
        let mut params = vec![
            ("scientificName", query.scientific_name.clone()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if query.has_coordinate {
            params.push(("hasCoordinate", "true".to_string()));
        }
        if query.exclude_geospatial_issues {
            params.push(("hasGeospatialIssue", "false".to_string()));
        }
        debug!("occurrence search: offset={offset} limit={limit}");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .map_err(|e| SdmError::AcquisitionFailed(format!("occurrence search failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SdmError::AcquisitionFailed(format!(
                "occurrence search returned HTTP {}",
                response.status()
            )));
        }
        response
            .json::<SearchPage>()
            .map_err(|e| SdmError::AcquisitionFailed(format!("invalid search response: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(rename = "endOfRecords")]
    end_of_records: bool,
    results: Vec<serde_json::Value>,
}

impl OccurrenceSource for GbifSource {
    fn fetch(&self, query: &OccurrenceQuery) -> SdmResult<Vec<OccurrenceRecord>> {
        let mut records = Vec::new();
        let mut offset = 0;
        while records.len() < query.limit {
            let page_size = PAGE_LIMIT.min(query.limit - records.len());
            let page = self.fetch_page(query, offset, page_size)?;
            let returned = page.results.len();
            for value in page.results {
                match serde_json::from_value::<OccurrenceRecord>(value) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!("skipping malformed occurrence result: {e}"),
                }
            }
            if page.end_of_records || returned == 0 {
                break;
            }
            offset += returned;
        }
        records.truncate(query.limit);
        info!(
            "fetched {} occurrence records for {}",
            records.len(),
            query.scientific_name
        );
        Ok(records)
    }
}

/// WorldClim-style climate download client.
///
/// Current climate comes as one single-band GeoTIFF per bioclimatic
/// variable; a future projection comes as one multi-band GeoTIFF per
/// (GCM, scenario, period). Files are global at the requested
/// resolution and are cropped locally, which guarantees the current and
/// future stacks end up on an identical grid.
pub struct WorldClimSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl WorldClimSource {
    pub fn new() -> SdmResult<Self> {
        Self::with_base_url("https://geodata.ucdavis.edu/climate")
    }

    pub fn with_base_url(base_url: &str) -> SdmResult<Self> {
        let client = reqwest::blocking::Client::builder()
            // global rasters are large
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| SdmError::AcquisitionFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Download `url` into the cache directory unless already present.
    fn download(&self, url: &str, cache_dir: &Path, file_name: &str) -> SdmResult<PathBuf> {
        fs::create_dir_all(cache_dir)?;
        let path = cache_dir.join(file_name);
        if path.exists() {
            debug!("using cached {file_name}");
            return Ok(path);
        }
        info!("downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SdmError::AcquisitionFailed(format!("climate download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SdmError::AcquisitionFailed(format!(
                "climate download returned HTTP {} for {url}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| SdmError::AcquisitionFailed(format!("climate download failed: {e}")))?;
        fs::write(&path, &bytes)?;
        Ok(path)
    }

    /// Read a downloaded global GeoTIFF and crop it to the study area.
    fn cropped_bands(&self, path: &Path, area: &Extent) -> SdmResult<Vec<Raster>> {
        geotiff::read_bands(path)?
            .into_iter()
            .map(|band| Raster::new(band, Extent::global()).crop(area))
            .collect()
    }
}

impl ClimateSource for WorldClimSource {
    fn fetch_current(&self, request: &ClimateRequest, area: &Extent) -> SdmResult<ClimateStack> {
        let res = request.resolution_arcmin;
        let mut bands = Vec::with_capacity(request.variables.len());
        for variable in &request.variables {
            let file_name = format!("wc2.1_{res}m_{variable}.tif");
            let url = format!("{}/{}", self.base_url, file_name);
            let path = self.download(&url, &request.cache_dir, &file_name)?;
            let mut rasters = self.cropped_bands(&path, area)?;
            if rasters.len() != 1 {
                return Err(SdmError::AcquisitionFailed(format!(
                    "{file_name} holds {} bands, expected a single-band file",
                    rasters.len()
                )));
            }
            let raster = rasters.remove(0);
            bands.push((variable.clone(), raster));
        }
        let extent = bands[0].1.extent();
        ClimateStack::from_bands(
            bands
                .into_iter()
                .map(|(name, raster)| (name, raster.into_data()))
                .collect(),
            extent,
        )
    }

    fn fetch_future(
        &self,
        request: &ClimateRequest,
        scenario: &FutureScenario,
        area: &Extent,
    ) -> SdmResult<ClimateStack> {
        let res = request.resolution_arcmin;
        let file_name = format!(
            "wc2.1_{res}m_bioc_{}_{}_{}.tif",
            scenario.gcm, scenario.scenario, scenario.period
        );
        let url = format!("{}/cmip6/{}", self.base_url, file_name);
        let path = self.download(&url, &request.cache_dir, &file_name)?;
        let rasters = self.cropped_bands(&path, area)?;
        if rasters.len() != request.variables.len() {
            return Err(SdmError::AcquisitionFailed(format!(
                "{file_name} holds {} bands, expected {}",
                rasters.len(),
                request.variables.len()
            )));
        }
        let extent = rasters[0].extent();
        // Projection files name nothing; bands are indexed in product
        // order and renamed to the current-stack names downstream.
        ClimateStack::from_bands(
            rasters
                .into_iter()
                .enumerate()
                .map(|(i, raster)| (format!("bioc_{}", i + 1), raster.into_data()))
                .collect(),
            extent,
        )
    }
}
