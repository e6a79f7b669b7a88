//! SVG charts rendered with plotters.
//!
//! The SVG backend is used so no system fonts are needed.

use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FigureError {
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("Nothing to plot: {0}")]
    NoData(&'static str),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for FigureError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        FigureError::Drawing(err.to_string())
    }
}

const SIZE: (u32, u32) = (800, 600);
const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

/// Axis titles of a single chart.
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a> {
    pub title: &'a str,
    pub x: &'a str,
    pub y: &'a str,
}

/// A named line series.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

fn padded_range<I: IntoIterator<Item = f64>>(values: I) -> Option<Range<f64>> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return None;
    }
    let pad = if max > min { (max - min) * 0.05 } else { min.abs().max(1.0) * 0.1 };
    Some(min - pad..max + pad)
}

fn color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Markers joined by a line, e.g. diffusion coefficient against crowder density.
pub fn scatter_line(path: &Path, labels: Labels, points: &[(f64, f64)]) -> Result<(), FigureError> {
    let x_range = padded_range(points.iter().map(|p| p.0)).ok_or(FigureError::NoData("scatter"))?;
    let y_range = padded_range(points.iter().map(|p| p.1)).ok_or(FigureError::NoData("scatter"))?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;
    chart.configure_mesh().x_desc(labels.x).y_desc(labels.y).draw()?;

    chart.draw_series(LineSeries::new(points.iter().copied(), color(0).stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&p| Circle::new(p, 5, color(0).filled())),
    )?;
    root.present()?;
    Ok(())
}

/// Mean values with symmetric standard-deviation bars.
pub fn error_bars(path: &Path, labels: Labels, points: &[(f64, f64, f64)]) -> Result<(), FigureError> {
    let x_range = padded_range(points.iter().map(|p| p.0)).ok_or(FigureError::NoData("error bars"))?;
    let y_range = padded_range(points.iter().flat_map(|&(_, m, s)| [m - s, m + s]))
        .ok_or(FigureError::NoData("error bars"))?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;
    chart.configure_mesh().x_desc(labels.x).y_desc(labels.y).draw()?;

    chart.draw_series(LineSeries::new(points.iter().map(|&(x, m, _)| (x, m)), color(0)))?;
    chart.draw_series(points.iter().map(|&(x, m, s)| {
        ErrorBar::new_vertical(x, m - s, m, m + s, color(0).filled(), 8)
    }))?;
    root.present()?;
    Ok(())
}

/// A single series on logarithmic axes. Non-positive values are dropped.
pub fn log_log_line(path: &Path, labels: Labels, points: &[(f64, f64)]) -> Result<(), FigureError> {
    let positive: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|&(x, y)| x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite())
        .collect();
    let (x_min, x_max) = bounds(positive.iter().map(|p| p.0)).ok_or(FigureError::NoData("log-log"))?;
    let (y_min, y_max) = bounds(positive.iter().map(|p| p.1)).ok_or(FigureError::NoData("log-log"))?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (x_min * 0.9..x_max * 1.1).log_scale(),
            (y_min * 0.9..y_max * 1.1).log_scale(),
        )?;
    chart.configure_mesh().x_desc(labels.x).y_desc(labels.y).draw()?;
    chart.draw_series(LineSeries::new(positive, color(0).stroke_width(2)))?;
    root.present()?;
    Ok(())
}

fn bounds<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    lo.is_finite().then_some((lo, hi))
}

/// Several labelled series sharing axes. NaN points are skipped.
pub fn multi_line(path: &Path, labels: Labels, series: &[Series]) -> Result<(), FigureError> {
    let all = || series.iter().flat_map(|s| s.points.iter());
    let x_range = padded_range(all().map(|p| p.0)).ok_or(FigureError::NoData("multi-line"))?;
    let y_range = padded_range(all().map(|p| p.1)).ok_or(FigureError::NoData("multi-line"))?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;
    chart.configure_mesh().x_desc(labels.x).y_desc(labels.y).draw()?;

    for (i, s) in series.iter().enumerate() {
        let style = color(i);
        let finite: Vec<(f64, f64)> = s
            .points
            .iter()
            .copied()
            .filter(|p| p.0.is_finite() && p.1.is_finite())
            .collect();
        chart
            .draw_series(LineSeries::new(finite.iter().copied(), style.stroke_width(2)))?
            .label(s.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        chart.draw_series(finite.into_iter().map(|p| Circle::new(p, 3, style.filled())))?;
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Histogram of `values` over `bins` equal-width bins spanning their range.
pub fn histogram(path: &Path, labels: Labels, values: &[f64], bins: usize) -> Result<(), FigureError> {
    let (lo, hi) = bounds(values.iter().copied().filter(|v| v.is_finite()))
        .ok_or(FigureError::NoData("histogram"))?;
    let bins = bins.max(1);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
    let mut counts = vec![0u32; bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = (((v - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..lo + width * bins as f64, 0u32..max_count + max_count / 10 + 1)?;
    chart.configure_mesh().x_desc(labels.x).y_desc(labels.y).draw()?;
    chart.draw_series(counts.iter().enumerate().map(|(i, &c)| {
        let x0 = lo + width * i as f64;
        Rectangle::new([(x0, 0), (x0 + width, c)], color(0).mix(0.7).filled())
    }))?;
    root.present()?;
    Ok(())
}

/// One panel of a Chapman-Kolmogorov test: predicted and estimated probabilities of
/// staying in a metastable set against lag time.
#[derive(Debug, Clone)]
pub struct CkPanel {
    pub set: usize,
    pub predicted: Vec<(f64, f64)>,
    pub estimated: Vec<(f64, f64)>,
}

/// Side-by-side panels, one per metastable set.
pub fn ck_grid(path: &Path, x_label: &str, panels: &[CkPanel]) -> Result<(), FigureError> {
    if panels.is_empty() {
        return Err(FigureError::NoData("CK test"));
    }
    let x_max = panels
        .iter()
        .flat_map(|p| p.predicted.iter().chain(&p.estimated))
        .map(|p| p.0)
        .fold(1.0f64, f64::max);

    let width = 300 * panels.len() as u32;
    let root = SVGBackend::new(path, (width, 320)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((1, panels.len()));
    for (area, panel) in areas.iter().zip(panels) {
        draw_ck_panel(area, x_label, x_max, panel)?;
    }
    root.present()?;
    Ok(())
}

fn draw_ck_panel(
    area: &DrawingArea<SVGBackend, Shift>,
    x_label: &str,
    x_max: f64,
    panel: &CkPanel,
) -> Result<(), FigureError> {
    let mut chart = ChartBuilder::on(area)
        .caption(format!("{} -> {}", panel.set + 1, panel.set + 1), ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..x_max * 1.05, 0.0..1.05)?;
    chart.configure_mesh().x_desc(x_label).y_desc("probability").draw()?;
    chart
        .draw_series(LineSeries::new(panel.predicted.iter().copied(), color(0).stroke_width(2)))?
        .label("predict")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color(0)));
    chart
        .draw_series(LineSeries::new(panel.estimated.iter().copied(), color(1).stroke_width(2)))?
        .label("estimate")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color(1)));
    chart.draw_series(
        panel
            .estimated
            .iter()
            .map(|&p| Circle::new(p, 3, color(1).filled())),
    )?;
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Node and edge lists of a transition network.
#[derive(Debug, Clone)]
pub struct Network {
    /// Node positions.
    pub nodes: Vec<(f64, f64)>,
    /// Relative node weights in `[0, 1]`.
    pub weights: Vec<f64>,
    /// `(from, to, probability)` edges.
    pub edges: Vec<(usize, usize, f64)>,
}

/// Draws states as circles sized by weight and transitions as lines whose width grows
/// with the transition probability.
pub fn network(path: &Path, labels: Labels, net: &Network) -> Result<(), FigureError> {
    let x_range = padded_range(net.nodes.iter().map(|p| p.0)).ok_or(FigureError::NoData("network"))?;
    let y_range = padded_range(net.nodes.iter().map(|p| p.1)).ok_or(FigureError::NoData("network"))?;

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, ("sans-serif", 20))
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;
    chart.configure_mesh().x_desc(labels.x).y_desc(labels.y).draw()?;

    for &(from, to, p) in &net.edges {
        if from == to {
            continue;
        }
        let (Some(&a), Some(&b)) = (net.nodes.get(from), net.nodes.get(to)) else {
            continue;
        };
        let width = (1.0 + p * 10.0).round() as u32;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![a, b],
            BLACK.mix(0.5).stroke_width(width),
        )))?;
    }
    for (i, &node) in net.nodes.iter().enumerate() {
        let weight = net.weights.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
        let radius = (8.0 + 30.0 * weight).round() as i32;
        chart.draw_series(std::iter::once(Circle::new(node, radius, color(i).filled())))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{}", i + 1),
            node,
            ("sans-serif", 14).into_font().color(&BLACK),
        )))?;
    }
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LABELS: Labels<'static> = Labels {
        title: "test",
        x: "x",
        y: "y",
    };

    #[test]
    fn padded_range_handles_constant_and_empty_input() {
        let range = padded_range([2.0, 2.0]).unwrap();
        assert!(range.start < 2.0 && range.end > 2.0);
        assert!(padded_range([f64::NAN]).is_none());
    }

    #[test]
    fn charts_are_written_as_svg() {
        let dir = tempdir().unwrap();
        let scatter = dir.path().join("scatter.svg");
        scatter_line(&scatter, LABELS, &[(0.0, 1.0), (100.0, 0.5)]).unwrap();
        let bars = dir.path().join("bars.svg");
        error_bars(&bars, LABELS, &[(0.0, 1.0, 0.0), (1.0, 0.8, 0.1)]).unwrap();
        let hist = dir.path().join("hist.svg");
        histogram(&hist, LABELS, &[1.0, 2.0, 2.5, 9.0], 5).unwrap();
        let log = dir.path().join("log.svg");
        log_log_line(&log, LABELS, &[(1.0, 100.0), (2.0, 10.0), (0.0, 5.0)]).unwrap();

        for path in [scatter, bars, hist, log] {
            let text = std::fs::read_to_string(path).unwrap();
            assert!(text.contains("<svg"));
        }
    }

    #[test]
    fn empty_input_is_reported() {
        let dir = tempdir().unwrap();
        let err = scatter_line(&dir.path().join("none.svg"), LABELS, &[]).unwrap_err();
        assert!(matches!(err, FigureError::NoData(_)));
        let err = ck_grid(&dir.path().join("ck.svg"), "lag", &[]).unwrap_err();
        assert!(matches!(err, FigureError::NoData(_)));
    }

    #[test]
    fn ck_grid_and_network_render() {
        let dir = tempdir().unwrap();
        let panels = vec![
            CkPanel {
                set: 0,
                predicted: vec![(0.0, 1.0), (1.0, 0.9)],
                estimated: vec![(0.0, 1.0), (1.0, 0.85)],
            },
            CkPanel {
                set: 1,
                predicted: vec![(0.0, 1.0), (1.0, 0.7)],
                estimated: vec![(0.0, 1.0), (1.0, 0.75)],
            },
        ];
        ck_grid(&dir.path().join("ck.svg"), "lag", &panels).unwrap();
        let net = Network {
            nodes: vec![(0.0, 0.0), (10.0, 5.0)],
            weights: vec![0.3, 0.7],
            edges: vec![(0, 1, 0.2), (1, 0, 0.1), (0, 0, 0.8)],
        };
        network(&dir.path().join("net.svg"), LABELS, &net).unwrap();
        assert!(dir.path().join("net.svg").exists());
    }
}
