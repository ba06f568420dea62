//! ROC figure rendering.
//!
//! Uses the plotters SVG backend so the figure embeds directly into the
//! report without system font dependencies.

use anyhow::Result;
use plotters::prelude::*;
use sdm_core::evaluation::EvaluationResult;

/// Render the ROC curve with its AUC annotation as an SVG string.
pub fn roc_chart_svg(result: &EvaluationResult) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("ROC curve (AUC = {:.3})", result.auc),
                ("sans-serif", 22),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;

        chart
            .configure_mesh()
            .x_desc("False positive rate")
            .y_desc("True positive rate")
            .draw()?;

        // chance line
        chart.draw_series(LineSeries::new(
            vec![(0.0, 0.0), (1.0, 1.0)],
            BLACK.mix(0.3).stroke_width(1),
        ))?;

        chart.draw_series(LineSeries::new(
            result
                .roc
                .iter()
                .map(|p| (p.false_positive_rate, p.true_positive_rate)),
            BLUE.stroke_width(2),
        ))?;

        root.present()?;
    }
    Ok(svg)
}
