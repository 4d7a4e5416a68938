//! Gallery rendering using plotters (SVG output)
//!
//! Uses the SVG backend to avoid system font dependencies. One scatter cell
//! is drawn per (X factor, Y factor) pair; the cell's slot in the figure is
//! a pure function of the factor indices and grid dimensions.

use anyhow::Result;
use plotters::prelude::*;
use plotters_svg::SVGBackend;
use std::path::Path;

use crate::config::ChartOptions;
use crate::gallery::{CorrelationFactor, CorrelationGallery, CorrelationValue};

/// Outer margin of the grid as a fraction of the figure.
pub const CELL_MARGIN_FRACTION: f64 = 0.1;

/// Symmetric expansion of each axis around the observed factor range.
pub const RANGE_EXPAND_FRACTION: f64 = 0.15;

/// Minimum scatter point radius (px); zero-weight points stay visible.
const MIN_POINT_RADIUS: f64 = 3.0;

/// Extra radius at size fraction 1.0, sqrt-scaled below that.
const POINT_RADIUS_SPAN: f64 = 15.0;

/// Pixel width reserved for y tick labels on first-column cells.
const Y_LABEL_AREA: u32 = 48;

/// Pixel height reserved for x tick labels on bottom-row cells.
const X_LABEL_AREA: u32 = 34;

/// Normalized layout slot of cell (ix, iy): `(left, bottom, width, height)`
/// in figure fractions, with y growing upward (bottom row has iy = 0).
/// Purely a function of index, grid dimensions and margin.
pub fn cell_rect(ix: usize, iy: usize, dim_x: usize, dim_y: usize, margin: f64) -> (f64, f64, f64, f64) {
    let width = 1.0 / (dim_x + 1) as f64;
    let height = 1.0 / (dim_y + 1) as f64;
    (
        margin + ix as f64 * width,
        margin + iy as f64 * height,
        width,
        height,
    )
}

/// Expands a (min, max) range symmetrically by `factor` of its span.
/// Undefined ranges pass through untouched.
pub fn expand_range(
    range: (Option<f64>, Option<f64>),
    factor: f64,
) -> (Option<f64>, Option<f64>) {
    let (Some(min), Some(max)) = range else {
        return range;
    };
    let diff = max - min;
    (Some(min - factor * diff), Some(max + factor * diff))
}

/// Wraps a factor display name at the fixed `" ("` delimiter so the
/// parenthesized qualifier (units, reference year) lands on its own line.
pub fn wrap_axis_label(label: &str) -> String {
    label.replace(" (", "\n(")
}

/// Maps t in [0, 1] onto a black -> red -> yellow -> white heat ramp.
/// Significant cells are drawn at the dark end (t near 0).
fn heat_ramp(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let r = (1.5 * t).min(1.0);
    let g = (2.0 * t - 1.0).max(0.0);
    let b = (4.0 * t - 3.0).max(0.0);
    RGBColor((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

fn point_radius(size_fraction: f64) -> i32 {
    (MIN_POINT_RADIUS + POINT_RADIUS_SPAN * size_fraction.max(0.0).sqrt()).round() as i32
}

/// Axis range for one factor: observed range expanded by the fixed margin,
/// falling back to 0..1 when the factor never saw a value. A zero-span
/// range is widened so the axis stays well-formed.
fn axis_range(factor: &CorrelationFactor) -> std::ops::Range<f64> {
    match expand_range(factor.range(), RANGE_EXPAND_FRACTION) {
        (Some(min), Some(max)) if max > min => min..max,
        (Some(min), Some(max)) => (min - 0.5)..(max + 0.5),
        _ => 0.0..1.0,
    }
}

fn overlay_text(corr: &CorrelationValue) -> String {
    if corr.is_degenerate() {
        "r=n/a p=n/a".to_string()
    } else {
        format!("r={:.4} p={:.6}", corr.r(), corr.p())
    }
}

/// Renders the full correlation gallery grid to an SVG file.
pub fn render_gallery(
    gallery: &CorrelationGallery,
    path: &Path,
    options: &ChartOptions,
) -> Result<()> {
    let root = SVGBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let dim_x = gallery.factors_x().len();
    let dim_y = gallery.factors_y().len();
    if dim_x == 0 || dim_y == 0 {
        root.draw(&Text::new(
            "No factors to display",
            (options.width as i32 / 2 - 60, options.height as i32 / 2),
            ("sans-serif", 20).into_font().color(&BLACK),
        ))?;
        root.present()?;
        return Ok(());
    }

    for (ix, fac_x) in gallery.factors_x().iter().enumerate() {
        for (iy, fac_y) in gallery.factors_y().iter().enumerate() {
            draw_cell(&root, gallery, ix, iy, fac_x, fac_y, options)?;
        }
    }

    root.present()?;
    log::info!("wrote correlation gallery: {}", path.display());
    Ok(())
}

fn draw_cell(
    root: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    gallery: &CorrelationGallery,
    ix: usize,
    iy: usize,
    fac_x: &CorrelationFactor,
    fac_y: &CorrelationFactor,
    options: &ChartOptions,
) -> Result<()> {
    let dim_x = gallery.factors_x().len();
    let dim_y = gallery.factors_y().len();
    let (left, bottom, width, height) = cell_rect(ix, iy, dim_x, dim_y, CELL_MARGIN_FRACTION);

    let fig_w = options.width as f64;
    let fig_h = options.height as f64;
    let px = (left * fig_w).round() as u32;
    let py = ((1.0 - bottom - height) * fig_h).round() as u32;
    let pw = (width * fig_w).round() as u32;
    let ph = (height * fig_h).round() as u32;

    // Outer-edge cells get tick label areas carved out of the figure margin
    // so the plotting rectangle stays identical for every cell.
    let y_label_px = if ix == 0 { Y_LABEL_AREA.min(px) } else { 0 };
    let x_label_px = if iy == 0 { X_LABEL_AREA } else { 0 };
    let cell = root.clone().shrink((px - y_label_px, py), (pw + y_label_px, ph + x_label_px));

    let mut chart = ChartBuilder::on(&cell)
        .x_label_area_size(x_label_px)
        .y_label_area_size(y_label_px)
        .build_cartesian_2d(axis_range(fac_x), axis_range(fac_y))?;

    let corr = gallery.correlation(ix, iy);

    // Shade the cell background by significance; degenerate (no-data) cells
    // stay unshaded so they are distinguishable from low-significance cells.
    if options.color_cells_by_significance {
        if let Some(c) = corr {
            if !c.is_degenerate() {
                chart
                    .plotting_area()
                    .fill(&heat_ramp(1.0 - c.signif_intensity()))?;
            }
        }
    }

    let grey = RGBColor(128, 128, 128);
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh()
        .axis_style(RGBColor(169, 169, 169))
        .label_style(("sans-serif", 8).into_font().color(&grey))
        .x_labels(4)
        .y_labels(4);
    if iy == 0 {
        mesh.x_desc(wrap_axis_label(fac_x.name()));
    }
    if ix == 0 {
        mesh.y_desc(wrap_axis_label(fac_y.name()));
    }
    mesh.draw()?;

    let series = gallery.complete_series(fac_x, fac_y)?;
    chart.draw_series(series.points.iter().map(|pt| {
        let color = RGBColor(pt.rgb.0, pt.rgb.1, pt.rgb.2);
        Circle::new(
            (pt.x, pt.y),
            point_radius(pt.size_fraction),
            color.mix(0.5).filled(),
        )
    }))?;

    if options.show_point_labels {
        chart.draw_series(series.points.iter().map(|pt| {
            Text::new(
                pt.label.clone(),
                (pt.x, pt.y),
                ("sans-serif", 8).into_font().color(&BLACK),
            )
        }))?;
    }

    if let Some(c) = corr {
        cell.draw(&Text::new(
            overlay_text(c),
            (y_label_px as i32 + 4, 4),
            ("sans-serif", 8).into_font().color(&BLACK.mix(0.6)),
        ))?;
    }

    Ok(())
}
