//! Assembly of the final analysis document.
//!
//! One self-contained HTML file with a table of contents, narrative
//! sections for each pipeline stage, the ROC figure, and two
//! interactive maps: continuous suitability/difference layers and
//! their binary-thresholded variants.

use crate::map::{map_html, write_overlay_png, MapLayer, OccurrenceMarker};
use crate::ramp::{difference_color, suitability_color, Rgb};
use crate::roc::roc_chart_svg;
use anyhow::{Context, Result};
use log::info;
use sdm_core::pipeline::{PipelineOutputs, PipelineParams};
use sdm_core::raster::Raster;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const STYLE: &str = r#"
body { font-family: Georgia, serif; margin: 0 auto; max-width: 960px; padding: 1em; color: #222; }
h1, h2 { font-family: Helvetica, Arial, sans-serif; }
nav ul { list-style: none; padding-left: 0; }
nav li { margin: 0.2em 0; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ccc; padding: 0.3em 0.8em; text-align: left; }
.map { height: 480px; margin: 1em 0; }
.legends { display: flex; gap: 2em; flex-wrap: wrap; margin-bottom: 1.5em; }
.legend { width: 220px; font-size: 0.85em; }
.legend-bar { height: 12px; border: 1px solid #999; }
.legend-labels { display: flex; justify-content: space-between; }
figure { margin: 1em 0; }
"#;

/// Render the report and its overlay PNGs into `out_dir`.
///
/// Returns the path of the written document.
pub fn render_report(
    params: &PipelineParams,
    outputs: &PipelineOutputs,
    out_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;

    let continuous = continuous_layers(outputs, out_dir)?;
    let binary = binary_layers(outputs, out_dir)?;
    let markers = occurrence_markers(outputs);
    let roc_svg = roc_chart_svg(&outputs.evaluation)?;

    let mut html = String::new();
    write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Species distribution projection: {species}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>{STYLE}</style>
</head>
<body>
<h1>Species distribution projection: <i>{species}</i></h1>
"#,
        species = params.species
    )?;

    // table of contents
    html.push_str(
        r##"<nav><ul>
<li><a href="#parameters">1. Parameters</a></li>
<li><a href="#occurrences">2. Occurrence data</a></li>
<li><a href="#climate">3. Study area and climate data</a></li>
<li><a href="#model">4. Model and evaluation</a></li>
<li><a href="#projection">5. Current vs. future projection</a></li>
<li><a href="#binary">6. Binary-thresholded projection</a></li>
</ul></nav>
"##,
    );

    write_parameters_section(&mut html, params)?;
    write_occurrence_section(&mut html, outputs)?;
    write_climate_section(&mut html, outputs)?;
    write_model_section(&mut html, outputs, &roc_svg)?;

    writeln!(html, r#"<h2 id="projection">5. Current vs. future projection</h2>"#)?;
    writeln!(
        html,
        "<p>Continuous habitat suitability under current climate and the \
         {} / {} projection for {}, and the cell-wise change (future − current). \
         Layers are togglable; color scales are normalized per raster, with the \
         difference layer on a symmetric domain around zero.</p>",
        params.scenario.scenario, params.scenario.gcm, params.scenario.period
    )?;
    html.push_str(&map_html("map_continuous", &outputs.area, &continuous, &markers));

    writeln!(html, r#"<h2 id="binary">6. Binary-thresholded projection</h2>"#)?;
    writeln!(
        html,
        "<p>Suitability classified at {} and the difference classified at {}.</p>",
        params.suitability_threshold, params.difference_threshold
    )?;
    html.push_str(&map_html("map_binary", &outputs.area, &binary, &markers));

    html.push_str("</body>\n</html>\n");

    let path = out_dir.join("report.html");
    fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote report to {}", path.display());
    Ok(path)
}

fn write_parameters_section(html: &mut String, params: &PipelineParams) -> Result<()> {
    writeln!(html, r#"<h2 id="parameters">1. Parameters</h2>"#)?;
    writeln!(html, "<table>")?;
    let rows = [
        ("Species", params.species.clone()),
        ("Record limit", params.record_limit.to_string()),
        ("Study-area offset (°)", params.offset_deg.to_string()),
        ("Resolution (arc-min)", params.resolution_arcmin.to_string()),
        ("Scenario", params.scenario.scenario.clone()),
        ("Climate model", params.scenario.gcm.clone()),
        ("Time window", params.scenario.period.clone()),
        ("Training fraction", params.train_fraction.to_string()),
        ("Split seed", params.split_seed.to_string()),
        ("Background seed", params.background_seed.to_string()),
        ("Background points", params.n_background.to_string()),
        ("Suitability threshold", params.suitability_threshold.to_string()),
        ("Difference threshold", params.difference_threshold.to_string()),
    ];
    for (name, value) in rows {
        writeln!(html, "<tr><th>{name}</th><td>{value}</td></tr>")?;
    }
    writeln!(html, "</table>")?;
    Ok(())
}

fn write_occurrence_section(html: &mut String, outputs: &PipelineOutputs) -> Result<()> {
    writeln!(html, r#"<h2 id="occurrences">2. Occurrence data</h2>"#)?;
    let n_unique = outputs.split.training.len() + outputs.split.evaluation.len();
    writeln!(
        html,
        "<p>{} georeferenced records loaded; {} unique coordinates, split into \
         {} training and {} evaluation points.</p>",
        outputs.occurrences.len(),
        n_unique,
        outputs.split.training.len(),
        outputs.split.evaluation.len()
    )?;
    Ok(())
}

fn write_climate_section(html: &mut String, outputs: &PipelineOutputs) -> Result<()> {
    writeln!(html, r#"<h2 id="climate">3. Study area and climate data</h2>"#)?;
    let area = outputs.area;
    let (rows, cols) = outputs.current.shape();
    writeln!(
        html,
        "<p>Study area: [{:.2}, {:.2}] × [{:.2}, {:.2}] degrees. Both climate \
         stacks carry {} bioclimatic bands on a shared {}×{} grid.</p>",
        area.min_lon,
        area.max_lon,
        area.min_lat,
        area.max_lat,
        outputs.current.n_bands(),
        rows,
        cols
    )?;
    Ok(())
}

fn write_model_section(html: &mut String, outputs: &PipelineOutputs, roc_svg: &str) -> Result<()> {
    writeln!(html, r#"<h2 id="model">4. Model and evaluation</h2>"#)?;
    let eval = &outputs.evaluation;
    writeln!(
        html,
        "<p>Climate envelope fitted on {} presences. Evaluated against {} held-out \
         presence points and {} random background points: <b>AUC = {:.3}</b>.</p>",
        outputs.model.n_presences(),
        eval.n_presence,
        eval.n_background,
        eval.auc
    )?;
    let current_ones = outputs.binary_current.count_at_least(1.0);
    let future_ones = outputs.binary_future.count_at_least(1.0);
    let finite = outputs.binary_current.finite_count().max(1);
    writeln!(
        html,
        "<p>Suitable area (cells above threshold): {:.1}% under current climate, \
         {:.1}% under the future scenario.</p>",
        100.0 * current_ones as f64 / finite as f64,
        100.0 * future_ones as f64 / finite as f64
    )?;
    writeln!(html, "<figure>{roc_svg}</figure>")?;
    Ok(())
}

fn suitability_layer(
    name: &str,
    file: &str,
    raster: &Raster,
    out_dir: &Path,
    visible: bool,
) -> Result<MapLayer> {
    let domain = raster.min_max().unwrap_or((0.0, 1.0));
    write_overlay_png(raster, suitability_color, domain, &out_dir.join(file))?;
    Ok(MapLayer {
        name: name.to_string(),
        file: file.to_string(),
        bounds: raster.extent(),
        domain,
        ramp: suitability_color,
        visible,
    })
}

fn continuous_layers(outputs: &PipelineOutputs, out_dir: &Path) -> Result<Vec<MapLayer>> {
    let mut layers = vec![
        suitability_layer(
            "Suitability (current)",
            "suitability_current.png",
            &outputs.suitability_current,
            out_dir,
            true,
        )?,
        suitability_layer(
            "Suitability (future)",
            "suitability_future.png",
            &outputs.suitability_future,
            out_dir,
            false,
        )?,
    ];

    // symmetric domain across the difference raster's own min/max
    let (lo, hi) = outputs.difference.min_max().unwrap_or((-1.0, 1.0));
    let magnitude = lo.abs().max(hi.abs()).max(f64::EPSILON);
    let domain = (-magnitude, magnitude);
    write_overlay_png(
        &outputs.difference,
        difference_color,
        domain,
        &out_dir.join("difference.png"),
    )?;
    layers.push(MapLayer {
        name: "Change (future − current)".to_string(),
        file: "difference.png".to_string(),
        bounds: outputs.difference.extent(),
        domain,
        ramp: difference_color,
        visible: false,
    });
    Ok(layers)
}

fn binary_layer(
    name: &str,
    file: &str,
    raster: &Raster,
    ramp: fn(f64) -> Rgb,
    out_dir: &Path,
    visible: bool,
) -> Result<MapLayer> {
    write_overlay_png(raster, ramp, (0.0, 1.0), &out_dir.join(file))?;
    Ok(MapLayer {
        name: name.to_string(),
        file: file.to_string(),
        bounds: raster.extent(),
        domain: (0.0, 1.0),
        ramp,
        visible,
    })
}

fn binary_layers(outputs: &PipelineOutputs, out_dir: &Path) -> Result<Vec<MapLayer>> {
    Ok(vec![
        binary_layer(
            "Binary suitability (current)",
            "binary_current.png",
            &outputs.binary_current,
            suitability_color,
            out_dir,
            true,
        )?,
        binary_layer(
            "Binary suitability (future)",
            "binary_future.png",
            &outputs.binary_future,
            suitability_color,
            out_dir,
            false,
        )?,
        binary_layer(
            "Binary change",
            "binary_difference.png",
            &outputs.binary_difference,
            difference_color,
            out_dir,
            false,
        )?,
    ])
}

fn occurrence_markers(outputs: &PipelineOutputs) -> Vec<OccurrenceMarker> {
    outputs
        .occurrences
        .iter()
        .map(|p| OccurrenceMarker {
            coord: p.coord,
            species: p.record.scientific_name.clone(),
            date_identified: p.record.date_identified.clone(),
            source_url: p.record.occurrence_id.clone(),
        })
        .collect()
}
