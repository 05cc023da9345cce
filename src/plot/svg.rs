//! Per-channel SVG rendering with Plotters.
//!
//! Each file holds two stacked panels:
//! - top: log-log data with error bars and the fitted line
//! - bottom: linear data with error bars and the power curve over the fit window

use std::path::Path;

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

use crate::error::AppError;
use crate::plot::{ChannelPlot, span};

/// Canvas size in pixels (width, height).
pub const CANVAS_SIZE: (u32, u32) = (600, 700);

/// Marker half-size in pixels.
const MARKER: i32 = 3;

/// One panel's series, already in plot coordinates.
struct Panel<'a> {
    title: String,
    x_desc: &'a str,
    y_desc: &'a str,
    xs: &'a [f64],
    x_errors: &'a [f64],
    ys: &'a [f64],
    y_errors: &'a [f64],
    curve: &'a [(f64, f64)],
}

/// Render one channel to `path`.
pub fn write_channel_svg(path: &Path, plot: &ChannelPlot) -> Result<(), AppError> {
    let root = SVGBackend::new(path, CANVAS_SIZE).into_drawing_area();
    let panels = root.split_evenly((2, 1));

    let log_panel = Panel {
        title: plot.log_title(),
        x_desc: "log(voltage [V])",
        y_desc: "log(gain)",
        xs: &plot.log_sample.log_voltages,
        x_errors: &plot.log_sample.log_voltage_errors,
        ys: &plot.log_sample.log_gains,
        y_errors: &plot.log_sample.log_gain_errors,
        curve: &plot.log_line,
    };
    let linear_panel = Panel {
        title: plot.linear_title(),
        x_desc: "voltage [V]",
        y_desc: "gain",
        xs: &plot.sample.voltages,
        x_errors: &plot.sample.voltage_errors,
        ys: &plot.sample.gains,
        y_errors: &plot.sample.gain_errors,
        curve: &plot.power_curve,
    };

    root.fill(&WHITE)
        .and_then(|_| draw_panel(&panels[0], &log_panel))
        .and_then(|_| draw_panel(&panels[1], &linear_panel))
        .and_then(|_| root.present())
        .map_err(|e| AppError::unwritable_output(path, e))?;

    log::debug!("Wrote plot '{}'", path.display());
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel<'_>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (x0, x1) = axis_range(panel.xs, panel.x_errors, panel.curve.iter().map(|p| p.0));
    let (y0, y1) = axis_range(panel.ys, panel.y_errors, panel.curve.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 16))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_desc)
        .y_desc(panel.y_desc)
        .x_labels(6)
        .y_labels(6)
        .draw()?;

    let points: Vec<(f64, f64, f64, f64)> = panel
        .xs
        .iter()
        .zip(panel.x_errors)
        .zip(panel.ys.iter().zip(panel.y_errors))
        .map(|((&x, &ex), (&y, &ey))| (x, ex, y, ey))
        .filter(|(x, ex, y, ey)| x.is_finite() && ex.is_finite() && y.is_finite() && ey.is_finite())
        .collect();

    let bar_style = BLACK.stroke_width(1);
    chart.draw_series(
        points
            .iter()
            .map(|&(x, _, y, ey)| ErrorBar::new_vertical(x, y - ey, y, y + ey, bar_style, 6)),
    )?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, ex, y, _)| ErrorBar::new_horizontal(y, x - ex, x, x + ex, bar_style, 6)),
    )?;
    chart.draw_series(points.iter().map(|&(x, _, y, _)| {
        EmptyElement::at((x, y)) + Rectangle::new([(-MARKER, -MARKER), (MARKER, MARKER)], bar_style)
    }))?;

    if !panel.curve.is_empty() {
        chart.draw_series(LineSeries::new(panel.curve.iter().copied(), RED.stroke_width(2)))?;
    }

    Ok(())
}

/// Axis range covering values ± errors and any extra points, padded by 5%.
fn axis_range(values: &[f64], errors: &[f64], extra: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut edges: Vec<f64> = values
        .iter()
        .zip(errors)
        .flat_map(|(&v, &e)| [v - e, v + e])
        .collect();
    edges.extend(extra);

    let (lo, hi) = span(&edges).unwrap_or((0.0, 1.0));
    let width = hi - lo;
    if width <= f64::EPSILON * hi.abs().max(1.0) {
        let pad = 0.5 * lo.abs().max(1.0);
        return (lo - pad, hi + pad);
    }
    (lo - 0.05 * width, hi + 0.05 * width)
}
