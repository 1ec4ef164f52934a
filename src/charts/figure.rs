//! Figure Module
//! A rendered chart description plus its drawing with plotters.
//!
//! Renderers build a [`Figure`] from the observation table; the figure can
//! then be drawn on any plotters backend, written as SVG or saved as PNG.

use super::ChartError;
use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use std::path::Path;

const FONT: &str = "sans-serif";

// Colors (RGB)
const SERIES_COLORS: [RGBColor; 3] = [
    RGBColor(31, 119, 180),  // Blue
    RGBColor(255, 127, 14),  // Orange
    RGBColor(44, 160, 44),   // Green
];
const NEW_POSITIVE_COLOR: RGBColor = RGBColor(191, 0, 191); // Magenta
const VARIATION_COLOR: RGBColor = RGBColor(255, 165, 0); // Orange on dark
const PIE_COLORS: [RGBColor; 3] = [
    RGBColor(0x22, 0x7c, 0x9d),
    RGBColor(0x17, 0xc3, 0xb2),
    RGBColor(0xff, 0xcb, 0x77),
];
const REGION_RING_COLORS: [RGBColor; 3] = [
    RGBColor(0x87, 0x4d, 0x9a),
    RGBColor(0xee, 0x42, 0x66),
    RGBColor(0xff, 0xd2, 0x3f),
];
const CASE_RING_COLORS: [RGBColor; 3] = [
    RGBColor(0xf1, 0x8f, 0x01),
    RGBColor(0x04, 0x8b, 0xa8),
    RGBColor(0x2e, 0x40, 0x57),
];

/// Named sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// What a figure shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Plot {
    /// Side-by-side vertical bars per category.
    GroupedBars {
        categories: Vec<String>,
        x_desc: String,
        series: Vec<Series>,
    },
    /// Horizontal bars per category, series stacked left to right.
    StackedBars {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    /// Daily line chart; `dark` switches to a dark background.
    Lines {
        dates: Vec<NaiveDate>,
        series: Vec<Series>,
        dark: bool,
    },
    /// One pie per series; every series has one value per slice.
    Pies { slices: Vec<String>, pies: Vec<Series> },
    /// Outer ring split by `outer`, inner ring splitting each outer segment
    /// into `inner_labels.len()` parts.
    NestedPie {
        outer: Series,
        outer_labels: Vec<String>,
        inner_labels: Vec<String>,
        inner: Vec<f64>,
    },
}

/// A chart ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub plot: Plot,
}

impl Figure {
    pub const DEFAULT_SIZE: (u32, u32) = (1000, 500);

    pub fn new(title: impl Into<String>, plot: Plot) -> Self {
        Self {
            title: title.into(),
            plot,
        }
    }

    /// Draw as an SVG document.
    pub fn to_svg(&self, size: (u32, u32)) -> Result<String, ChartError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
            self.draw(&root)?;
            root.present()?;
        }
        Ok(svg)
    }

    /// Save as PNG.
    pub fn save_png(&self, path: &Path, size: (u32, u32)) -> Result<(), ChartError> {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        self.draw(&root)?;
        root.present()?;
        Ok(())
    }

    /// Save as SVG when the path ends in `.svg`, PNG otherwise.
    pub fn save(&self, path: &Path, size: (u32, u32)) -> Result<(), ChartError> {
        let is_svg = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
        if is_svg {
            std::fs::write(path, self.to_svg(size)?)?;
            Ok(())
        } else {
            self.save_png(path, size)
        }
    }

    /// Draw on any plotters drawing area.
    pub fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), ChartError> {
        match &self.plot {
            Plot::GroupedBars {
                categories,
                x_desc,
                series,
            } => draw_grouped_bars(root, &self.title, categories, x_desc, series),
            Plot::StackedBars { categories, series } => {
                draw_stacked_bars(root, &self.title, categories, series)
            }
            Plot::Lines {
                dates,
                series,
                dark,
            } => draw_lines(root, &self.title, dates, series, *dark),
            Plot::Pies { slices, pies } => draw_pies(root, &self.title, slices, pies),
            Plot::NestedPie {
                outer,
                outer_labels,
                inner_labels,
                inner,
            } => draw_nested_pie(root, &self.title, outer, outer_labels, inner_labels, inner),
        }
    }
}

/// Value axis range padded by 5%, always including zero.
fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (mut min, mut max) = (0.0f64, 0.0f64);
    for &v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if max - min == 0.0 {
        return (0.0, 1.0);
    }
    let pad = (max - min) * 0.05;
    (if min < 0.0 { min - pad } else { 0.0 }, max + pad)
}

/// Category label for an integer tick; blank between ticks.
fn category_label(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

fn draw_grouped_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    categories: &[String],
    x_desc: &str,
    series: &[Series],
) -> Result<(), ChartError> {
    root.fill(&WHITE)?;
    let n = categories.len();
    let (y_min, y_max) = value_range(series.iter().flat_map(|s| s.values.iter()));

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)?;

    let x_fmt = |x: &f64| category_label(categories, *x);
    let y_fmt = |y: &f64| format!("{y:.0}");
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .x_desc(x_desc)
        .draw()?;

    let width = 0.8 / series.len().max(1) as f64;
    for (j, s) in series.iter().enumerate() {
        let color = SERIES_COLORS[j % SERIES_COLORS.len()];
        chart
            .draw_series(s.values.iter().enumerate().map(|(i, &v)| {
                let left = i as f64 - 0.4 + j as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, v)], color.filled())
            }))?
            .label(s.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_stacked_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    categories: &[String],
    series: &[Series],
) -> Result<(), ChartError> {
    root.fill(&WHITE)?;
    let n = categories.len();
    let totals: Vec<f64> = (0..n)
        .map(|i| series.iter().filter_map(|s| s.values.get(i)).sum())
        .collect();
    let (_, x_max) = value_range(totals.iter());

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..x_max, -0.5f64..(n as f64 - 0.5))?;

    let x_fmt = |x: &f64| format!("{x:.0}");
    let y_fmt = |y: &f64| category_label(categories, *y);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n + 1)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .draw()?;

    let mut offsets = vec![0.0f64; n];
    for (j, s) in series.iter().enumerate() {
        let color = SERIES_COLORS[j % SERIES_COLORS.len()];
        let bars: Vec<Rectangle<(f64, f64)>> = s
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let start = offsets[i];
                offsets[i] += v;
                let y = i as f64;
                Rectangle::new([(start, y - 0.4), (start + v, y + 0.4)], color.filled())
            })
            .collect();
        chart
            .draw_series(bars)?
            .label(s.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_lines<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    dates: &[NaiveDate],
    series: &[Series],
    dark: bool,
) -> Result<(), ChartError> {
    let (background, foreground) = if dark { (BLACK, WHITE) } else { (WHITE, BLACK) };
    root.fill(&background)?;

    let x_max = dates.len().saturating_sub(1).max(1) as f64;
    let (y_min, y_max) = value_range(series.iter().flat_map(|s| s.values.iter()));

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24).into_font().color(&foreground))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, y_min..y_max)?;

    let x_fmt = |x: &f64| {
        let idx = x.round();
        if idx < 0.0 {
            return String::new();
        }
        dates
            .get(idx as usize)
            .map(|d| d.format("%d/%m").to_string())
            .unwrap_or_default()
    };
    let y_fmt = |y: &f64| format!("{y:.0}");
    chart
        .configure_mesh()
        .x_labels(12)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .axis_style(foreground.stroke_width(1))
        .bold_line_style(foreground.mix(0.2).stroke_width(1))
        .light_line_style(foreground.mix(0.05).stroke_width(1))
        .label_style((FONT, 14).into_font().color(&foreground))
        .x_desc("data")
        .draw()?;

    for (j, s) in series.iter().enumerate() {
        let color = match (series.len(), dark) {
            (1, true) => VARIATION_COLOR,
            (1, false) => NEW_POSITIVE_COLOR,
            _ => SERIES_COLORS[j % SERIES_COLORS.len()],
        };
        chart
            .draw_series(LineSeries::new(
                s.values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
                color.stroke_width(2),
            ))?
            .label(s.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(background.mix(0.8))
        .border_style(foreground)
        .label_font((FONT, 14).into_font().color(&foreground))
        .draw()?;
    Ok(())
}

fn draw_pies<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    slices: &[String],
    pies: &[Series],
) -> Result<(), ChartError> {
    root.fill(&WHITE)?;
    let root = root.titled(title, (FONT, 26))?;
    let colors: Vec<RGBColor> = (0..slices.len())
        .map(|i| PIE_COLORS[i % PIE_COLORS.len()])
        .collect();

    for (area, pie) in root.split_evenly((1, pies.len().max(1))).iter().zip(pies) {
        let area = area.titled(&pie.name, (FONT, 20))?;
        let (w, h) = area.dim_in_pixel();
        let center = ((w / 2) as i32, (h / 2) as i32);
        let radius = w.min(h) as f64 * 0.4;

        let mut chart = Pie::new(&center, &radius, &pie.values, &colors, slices);
        chart.label_style((FONT, 14).into_font().color(&BLACK));
        chart.percentages((FONT, 14).into_font().color(&BLACK));
        area.draw(&chart)?;
    }
    Ok(())
}

fn draw_nested_pie<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    outer: &Series,
    outer_labels: &[String],
    inner_labels: &[String],
    inner: &[f64],
) -> Result<(), ChartError> {
    root.fill(&WHITE)?;
    let root = root.titled(title, (FONT, 26))?;
    let (w, h) = root.dim_in_pixel();
    let center = ((w / 3) as i32, (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.42;

    let outer_colors: Vec<RGBColor> = (0..outer.values.len())
        .map(|i| REGION_RING_COLORS[i % REGION_RING_COLORS.len()])
        .collect();
    let mut outer_pie = Pie::new(&center, &radius, &outer.values, &outer_colors, outer_labels);
    outer_pie.start_angle(90.0);
    outer_pie.label_style((FONT, 16).into_font().color(&BLACK));
    root.draw(&outer_pie)?;

    let inner_radius = radius * 0.75;
    let inner_colors: Vec<RGBColor> = (0..inner.len())
        .map(|i| CASE_RING_COLORS[i % CASE_RING_COLORS.len()])
        .collect();
    let blank: Vec<String> = vec![String::new(); inner.len()];
    let mut inner_pie = Pie::new(&center, &inner_radius, inner, &inner_colors, &blank);
    inner_pie.start_angle(90.0);
    root.draw(&inner_pie)?;

    root.draw(&Circle::new(center, (radius * 0.5) as i32, WHITE.filled()))?;

    // Legend: regions, then the case categories.
    let legend_x = (w as f64 * 0.72) as i32;
    let entries = outer_labels
        .iter()
        .zip(&outer_colors)
        .chain(inner_labels.iter().zip(CASE_RING_COLORS.iter()));
    for (row, (label, color)) in entries.enumerate() {
        let y = 30 + row as i32 * 26;
        root.draw(&Rectangle::new(
            [(legend_x, y), (legend_x + 14, y + 14)],
            color.filled(),
        ))?;
        root.draw(&Text::new(
            label.clone(),
            (legend_x + 22, y),
            (FONT, 15).into_font(),
        ))?;
    }
    Ok(())
}
