//! Time-series chart of an extraction result using plotters.
//!
//! Current goes on the left axis, both voltages on a secondary right axis.

use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

use crate::extract::{load_result, ExtractionResult};
use crate::log;

const CHART_SIZE: (u32, u32) = (1400, 800);

const COLOR_CURRENT: RGBColor = RGBColor(220, 40, 40);
const COLOR_MPS: RGBColor = RGBColor(0, 180, 200);
const COLOR_MAG: RGBColor = RGBColor(140, 60, 180);

/// Axis range covering `values` with 5% padding on both ends.
/// A flat series gets a unit-wide range so the axis is never empty.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }

    let span = max - min;
    if span <= f64::EPSILON {
        return (min - 0.5)..(max + 0.5);
    }
    (min - span * 0.05)..(max + span * 0.05)
}

/// Loads `input_path` and renders it to `output_path`.
pub fn run_plot(input_path: &Path, output_path: &Path) -> Result<()> {
    let result = load_result(input_path)?;
    render_chart(&result, output_path)?;
    log(&format!(
        "Chart with {} samples saved to {}",
        result.data.len(),
        output_path.display()
    ));
    Ok(())
}

/// Draws current and voltages against `time_sec`.
pub fn render_chart(result: &ExtractionResult, output_path: &Path) -> Result<()> {
    if result.data.is_empty() {
        return Err(anyhow!("No samples to plot in result for {}", result.video));
    }
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create chart directory")?;
    }

    let x_range = padded_range(result.data.iter().map(|s| s.time_sec));
    let current_range = padded_range(result.data.iter().map(|s| s.current_a));
    let voltage_range = padded_range(
        result
            .data
            .iter()
            .flat_map(|s| [s.mps_v, s.mag_v]),
    );

    let root = BitMapBackend::new(output_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)
        .context("Failed to fill chart background")?;

    let title = format!("Current and Voltages - {}", result.video);

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .right_y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), current_range)
        .context("Failed to build chart")?
        .set_secondary_coord(x_range, voltage_range);

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Current (A)")
        .y_label_formatter(&|y| format!("{:.0}", y))
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .configure_secondary_axes()
        .y_desc("Voltage (V)")
        .y_label_formatter(&|y| format!("{:.2}", y))
        .draw()
        .context("Failed to draw secondary axis")?;

    chart
        .draw_series(LineSeries::new(
            result.data.iter().map(|s| (s.time_sec, s.current_a)),
            COLOR_CURRENT.stroke_width(2),
        ))?
        .label("Current (A)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], COLOR_CURRENT.stroke_width(2)));

    chart
        .draw_secondary_series(LineSeries::new(
            result.data.iter().map(|s| (s.time_sec, s.mps_v)),
            COLOR_MPS.stroke_width(2),
        ))?
        .label("MPS (V)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], COLOR_MPS.stroke_width(2)));

    chart
        .draw_secondary_series(LineSeries::new(
            result.data.iter().map(|s| (s.time_sec, s.mag_v)),
            COLOR_MAG.stroke_width(2),
        ))?
        .label("MAG (V)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], COLOR_MAG.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .context("Failed to draw legend")?;

    root.present().context("Failed to save chart")?;
    Ok(())
}
