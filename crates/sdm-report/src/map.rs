//! Interactive map assembly: raster overlays as transparent PNGs plus
//! Leaflet markup with layer controls, legends and occurrence popups.
//!
//! Rendering only reads the rasters; toggling layers in the browser
//! never touches the underlying data.

use crate::ramp::{gradient_css, Rgb};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use sdm_core::raster::Raster;
use sdm_core::spatial::{Coordinate, Extent};
use std::fmt::Write as _;
use std::path::Path;

/// Overlay opacity; keeps the basemap readable underneath.
const OVERLAY_ALPHA: u8 = 200;

/// One togglable raster overlay.
pub struct MapLayer {
    /// Name shown in the layer control.
    pub name: String,
    /// PNG file name, relative to the report document.
    pub file: String,
    pub bounds: Extent,
    /// Value domain the colors were normalized to.
    pub domain: (f64, f64),
    pub ramp: fn(f64) -> Rgb,
    /// Whether the layer starts enabled.
    pub visible: bool,
}

/// One occurrence marker with its popup fields.
pub struct OccurrenceMarker {
    pub coord: Coordinate,
    pub species: String,
    pub date_identified: Option<String>,
    pub source_url: Option<String>,
}

/// Write a raster as a transparent PNG, colors normalized to `domain`.
///
/// Missing cells become fully transparent pixels.
pub fn write_overlay_png(
    raster: &Raster,
    ramp: fn(f64) -> Rgb,
    domain: (f64, f64),
    path: &Path,
) -> Result<()> {
    let (nrows, ncols) = raster.shape();
    let (lo, hi) = domain;
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut img = RgbaImage::new(ncols as u32, nrows as u32);
    for ((row, col), &v) in raster.data().indexed_iter() {
        let pixel = if v.is_finite() {
            let [r, g, b] = ramp((v - lo) / span);
            Rgba([r, g, b, OVERLAY_ALPHA])
        } else {
            Rgba([0, 0, 0, 0])
        };
        img.put_pixel(col as u32, row as u32, pixel);
    }
    img.save(path)
        .with_context(|| format!("failed to write overlay {}", path.display()))?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn bounds_js(extent: &Extent) -> String {
    format!(
        "[[{}, {}], [{}, {}]]",
        extent.min_lat, extent.min_lon, extent.max_lat, extent.max_lon
    )
}

/// Emit one interactive map: a sized div, the Leaflet setup script,
/// and a legend block below the map.
pub fn map_html(
    map_id: &str,
    view: &Extent,
    layers: &[MapLayer],
    markers: &[OccurrenceMarker],
) -> String {
    let mut html = String::new();

    writeln!(html, r#"<div id="{map_id}" class="map"></div>"#).unwrap();

    // legends
    writeln!(html, r#"<div class="legends">"#).unwrap();
    for layer in layers {
        let (lo, hi) = layer.domain;
        writeln!(
            html,
            r#"<div class="legend"><span class="legend-title">{}</span>
<div class="legend-bar" style="background: {};"></div>
<div class="legend-labels"><span>{:.2}</span><span>{:.2}</span></div></div>"#,
            escape(&layer.name),
            gradient_css(layer.ramp),
            lo,
            hi
        )
        .unwrap();
    }
    writeln!(html, "</div>").unwrap();

    writeln!(html, "<script>").unwrap();
    writeln!(
        html,
        "var {map_id} = L.map('{map_id}').fitBounds({});",
        bounds_js(view)
    )
    .unwrap();
    writeln!(
        html,
        "L.tileLayer('https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', \
         {{ attribution: '&copy; OpenStreetMap contributors' }}).addTo({map_id});"
    )
    .unwrap();

    for (i, layer) in layers.iter().enumerate() {
        writeln!(
            html,
            "var {map_id}_layer{i} = L.imageOverlay('{}', {});",
            layer.file,
            bounds_js(&layer.bounds)
        )
        .unwrap();
        if layer.visible {
            writeln!(html, "{map_id}_layer{i}.addTo({map_id});").unwrap();
        }
    }

    writeln!(html, "var {map_id}_markers = L.layerGroup();").unwrap();
    for marker in markers {
        let mut popup = format!("<b>{}</b>", escape(&marker.species));
        if let Some(date) = &marker.date_identified {
            write!(popup, "<br>identified {}", escape(date)).unwrap();
        }
        if let Some(url) = &marker.source_url {
            write!(popup, "<br><a href=\\'{}\\'>record</a>", escape(url)).unwrap();
        }
        writeln!(
            html,
            "L.marker([{}, {}]).bindPopup('{}').addTo({map_id}_markers);",
            marker.coord.lat, marker.coord.lon, popup
        )
        .unwrap();
    }
    writeln!(html, "{map_id}_markers.addTo({map_id});").unwrap();

    let overlays: Vec<String> = layers
        .iter()
        .enumerate()
        .map(|(i, layer)| format!("'{}': {map_id}_layer{i}", escape(&layer.name)))
        .collect();
    writeln!(
        html,
        "L.control.layers(null, {{ {}, 'Occurrences': {map_id}_markers }}).addTo({map_id});",
        overlays.join(", ")
    )
    .unwrap();
    writeln!(html, "</script>").unwrap();

    html
}
