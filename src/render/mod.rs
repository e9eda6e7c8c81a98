//! Plot renderer: builds a figure model from table columns and paints it into PNG bytes.
//!
//! Every call owns its pixel buffer and drawing area; nothing is kept between calls,
//! so repeated renders in one session cannot leak figure state.

mod charts;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_backend::DrawingErrorKind;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::table::{stats::BoxSummary, ColumnType};

pub use charts::{bar, boxplot, histogram, line, pie, scatter};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("column `{0}` not found")]
    UnknownColumn(String),
    #[error("column `{column}` must be {expected}, but it is {found}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: ColumnType,
    },
    #[error("no values to plot for `{0}`")]
    NoData(String),
    #[error("font unavailable: {0}")]
    Font(String),
    #[error("drawing failed: {0}")]
    Drawing(String),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl RenderError {
    fn from_area<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> Self {
        match err {
            DrawingAreaErrorKind::BackendError(DrawingErrorKind::FontError(e)) => {
                RenderError::Font(e.to_string())
            }
            other => RenderError::Drawing(other.to_string()),
        }
    }
}

/// Encoded image bytes plus their format, as handed to figure-save.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("png")
    }
}

/// Optional styling shared by every plot kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlotOptions {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub xlabel: Option<String>,
    #[serde(default)]
    pub ylabel: Option<String>,
    #[serde(default)]
    pub hue: Option<String>,
    #[serde(default)]
    pub bins: Option<usize>,
}

impl PlotOptions {
    fn title_or(&self, fallback: &str) -> String {
        self.title.clone().unwrap_or_else(|| fallback.to_string())
    }

    fn xlabel_or(&self, fallback: &str) -> String {
        self.xlabel.clone().unwrap_or_else(|| fallback.to_string())
    }

    fn ylabel_or(&self, fallback: &str) -> String {
        self.ylabel.clone().unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    Default,
    White,
    WhiteGrid,
    Dark,
    DarkGrid,
}

impl Theme {
    fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" | "classic" => Theme::Default,
            "white" => Theme::White,
            "whitegrid" | "seaborn-whitegrid" => Theme::WhiteGrid,
            "dark" => Theme::Dark,
            "darkgrid" | "seaborn-darkgrid" => Theme::DarkGrid,
            other => {
                warn!(style = other, "unknown plot style, using default");
                Theme::Default
            }
        }
    }

    fn background(self) -> RGBColor {
        match self {
            Theme::Dark | Theme::DarkGrid => RGBColor(234, 234, 242),
            _ => WHITE,
        }
    }

    fn grid(self) -> Option<RGBColor> {
        match self {
            Theme::WhiteGrid => Some(RGBColor(220, 220, 220)),
            Theme::DarkGrid => Some(WHITE),
            _ => None,
        }
    }
}

/// Figure defaults taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub name: String,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self::new("default", 12.0, 8.0, 150)
    }
}

/// Largest bitmap side in pixels.
const MAX_SIDE_PX: u32 = 8192;

impl PlotStyle {
    /// Lowers `dpi` when the longer side would exceed [`MAX_SIDE_PX`].
    pub fn new(name: &str, width_in: f64, height_in: f64, dpi: u32) -> Self {
        let cap = (MAX_SIDE_PX as f64 / width_in.max(height_in)).floor().max(1.0) as u32;
        let dpi = match dpi.max(1) {
            d if d > cap => {
                warn!(requested = d, used = cap, width_in, height_in, "DPI too large for figure size, capping");
                cap
            }
            d => d,
        };
        Self { name: name.to_string(), width_in, height_in, dpi }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| ((inches * self.dpi as f64).round() as u32).clamp(64, MAX_SIDE_PX);
        (px(self.width_in), px(self.height_in))
    }

    fn font_px(&self, points: f64) -> u32 {
        ((points * self.dpi as f64 / 72.0).round() as u32).max(8)
    }

    fn font(&self, points: f64) -> (&'static str, f64) {
        ("sans-serif", self.font_px(points) as f64)
    }

    fn theme(&self) -> Theme {
        Theme::parse(&self.name)
    }
}

// seaborn "deep"
const PALETTE: [RGBColor; 10] = [
    RGBColor(76, 114, 176),
    RGBColor(221, 132, 82),
    RGBColor(85, 168, 104),
    RGBColor(196, 78, 82),
    RGBColor(129, 114, 179),
    RGBColor(147, 120, 96),
    RGBColor(218, 139, 195),
    RGBColor(140, 140, 140),
    RGBColor(204, 185, 116),
    RGBColor(100, 181, 205),
];

fn color(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum XTicks {
    Numeric,
    Dates,
    Categories(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mark {
    Rect { x0: f64, y0: f64, x1: f64, y1: f64, color: usize },
    Point { x: f64, y: f64, color: usize },
    Path { points: Vec<(f64, f64)>, color: usize, markers: bool },
    Box { center: f64, half_width: f64, summary: BoxSummary, color: usize },
    /// Pie slice; angles in degrees, counter-clockwise from the positive x axis.
    Wedge { start: f64, sweep: f64, color: usize, label: String, share: f64 },
}

/// Renderer-independent description of one chart.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub x_ticks: XTicks,
    pub marks: Vec<Mark>,
    pub legend: Vec<(String, usize)>,
    pub polar: bool,
}

pub(crate) fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Paints a figure; falls back to a text-free rendering when no font can be loaded.
pub(crate) fn paint(fig: &Figure, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    let pixels = match draw_pixels(fig, style, true) {
        Ok(px) => px,
        Err(RenderError::Font(reason)) => {
            warn!(%reason, title = %fig.title, "no usable font, rendering figure without text");
            draw_pixels(fig, style, false)?
        }
        Err(e) => return Err(e),
    };
    encode_png(pixels, style.pixel_size())
}

fn draw_pixels(fig: &Figure, style: &PlotStyle, text: bool) -> Result<Vec<u8>, RenderError> {
    let (w, h) = style.pixel_size();
    let mut buf = vec![0u8; (w as usize) * (h as usize) * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
        let drawn = if fig.polar {
            draw_polar(&root, fig, style, text)
        } else {
            draw_cartesian(&root, fig, style, text)
        };
        drawn.map_err(RenderError::from_area)?;
        root.present().map_err(RenderError::from_area)?;
    }
    Ok(buf)
}

fn encode_png(pixels: Vec<u8>, (w, h): (u32, u32)) -> Result<RenderedImage, RenderError> {
    let img = RgbImage::from_raw(w, h, pixels)
        .ok_or_else(|| RenderError::Drawing("pixel buffer does not match figure size".into()))?;
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(RenderedImage { bytes, format: ImageFormat::Png, width: w, height: h })
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type DrawResult<'a> = Result<(), DrawingAreaErrorKind<<BitMapBackend<'a> as DrawingBackend>::ErrorType>>;

fn draw_cartesian<'a>(root: &Area<'a>, fig: &Figure, style: &PlotStyle, text: bool) -> DrawResult<'a> {
    let theme = style.theme();
    let tick_px = style.font_px(11.0);
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(root);
    builder.margin(style.font_px(10.0));
    if text {
        if !fig.title.is_empty() {
            builder.caption(&fig.title, style.font(16.0));
        }
        builder
            .x_label_area_size(tick_px * 3)
            .y_label_area_size(tick_px * 5);
    } else {
        builder.x_label_area_size(tick_px).y_label_area_size(tick_px);
    }
    let mut chart = builder.build_cartesian_2d(
        fig.x_range.0..fig.x_range.1,
        fig.y_range.0..fig.y_range.1,
    )?;
    chart.plotting_area().fill(&theme.background())?;

    let format_x = |x: &f64| match &fig.x_ticks {
        XTicks::Numeric => format_tick(*x),
        XTicks::Dates => chrono::DateTime::from_timestamp(*x as i64, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        XTicks::Categories(names) => {
            let idx = x.round();
            if (x - idx).abs() < 1e-6 && idx >= 0.0 {
                names.get(idx as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        }
    };
    let format_y = |y: &f64| format_tick(*y);

    if text {
        let mut mesh = chart.configure_mesh();
        match theme.grid() {
            Some(grid) => {
                mesh.bold_line_style(grid.stroke_width(1))
                    .light_line_style(grid.mix(0.4).stroke_width(1));
            }
            None => {
                mesh.disable_mesh();
            }
        }
        if let XTicks::Categories(names) = &fig.x_ticks {
            mesh.x_labels(names.len().max(2));
        }
        mesh.x_desc(fig.x_label.as_str())
            .y_desc(fig.y_label.as_str())
            .label_style(style.font(11.0))
            .axis_desc_style(style.font(13.0))
            .x_label_formatter(&format_x)
            .y_label_formatter(&format_y)
            .draw()?;
    } else {
        chart.plotting_area().draw(&Rectangle::new(
            [(fig.x_range.0, fig.y_range.0), (fig.x_range.1, fig.y_range.1)],
            BLACK.stroke_width(1),
        ))?;
    }

    let marker = (style.font_px(3.0) as i32).max(3);
    for mark in &fig.marks {
        match mark {
            Mark::Rect { x0, y0, x1, y1, color: c } => {
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(*x0, *y0), (*x1, *y1)],
                    color(*c).mix(0.85).filled(),
                )))?;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(*x0, *y0), (*x1, *y1)],
                    WHITE.stroke_width(1),
                )))?;
            }
            Mark::Point { x, y, color: c } => {
                chart.draw_series(std::iter::once(Circle::new(
                    (*x, *y),
                    marker,
                    color(*c).mix(0.8).filled(),
                )))?;
            }
            Mark::Path { points, color: c, markers } => {
                chart.draw_series(std::iter::once(PathElement::new(
                    points.clone(),
                    color(*c).stroke_width(2),
                )))?;
                if *markers {
                    chart.draw_series(
                        points.iter().map(|p| Circle::new(*p, marker, color(*c).filled())),
                    )?;
                }
            }
            Mark::Box { center, half_width, summary, color: c } => {
                let (l, r) = (center - half_width, center + half_width);
                let edge = RGBColor(60, 60, 60).stroke_width(2);
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(l, summary.q1), (r, summary.q3)],
                    color(*c).filled(),
                )))?;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(l, summary.q1), (r, summary.q3)],
                    edge,
                )))?;
                let cap = half_width / 2.0;
                let segments = [
                    vec![(l, summary.median), (r, summary.median)],
                    vec![(*center, summary.q3), (*center, summary.whisker_high)],
                    vec![(*center, summary.q1), (*center, summary.whisker_low)],
                    vec![(center - cap, summary.whisker_high), (center + cap, summary.whisker_high)],
                    vec![(center - cap, summary.whisker_low), (center + cap, summary.whisker_low)],
                ];
                chart.draw_series(segments.into_iter().map(|s| PathElement::new(s, edge)))?;
                chart.draw_series(
                    summary
                        .outliers
                        .iter()
                        .map(|v| Circle::new((*center, *v), marker, RGBColor(60, 60, 60).stroke_width(1))),
                )?;
            }
            Mark::Wedge { .. } => {}
        }
    }

    if text && !fig.legend.is_empty() {
        for (name, c) in &fig.legend {
            let swatch = color(*c);
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], swatch.filled()));
        }
        chart
            .configure_series_labels()
            .label_font(style.font(11.0))
            .background_style(&WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_polar<'a>(root: &Area<'a>, fig: &Figure, style: &PlotStyle, text: bool) -> DrawResult<'a> {
    root.fill(&WHITE)?;
    let area = if text && !fig.title.is_empty() {
        root.titled(&fig.title, style.font(16.0))?
    } else {
        root.clone()
    };
    let (w, h) = area.dim_in_pixel();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.38;
    let at = |deg: f64, r: f64| {
        let rad = deg.to_radians();
        ((cx + r * rad.cos()).round() as i32, (cy - r * rad.sin()).round() as i32)
    };

    for mark in &fig.marks {
        let Mark::Wedge { start, sweep, color: c, label, share } = mark else { continue };
        let steps = (sweep.abs().ceil() as usize).max(2);
        let mut outline = vec![(cx.round() as i32, cy.round() as i32)];
        for i in 0..=steps {
            outline.push(at(start + sweep * i as f64 / steps as f64, radius));
        }
        area.draw(&Polygon::new(outline.clone(), color(*c).filled()))?;
        area.draw(&PathElement::new(outline, WHITE.stroke_width(2)))?;

        if text {
            let mid = start + sweep / 2.0;
            let centered = Pos::new(HPos::Center, VPos::Center);
            let label_style = TextStyle::from(style.font(12.0).into_font()).pos(centered);
            let pct_style = TextStyle::from(style.font(11.0).into_font()).pos(centered);
            area.draw(&Text::new(label.clone(), at(mid, radius * 1.12), label_style))?;
            area.draw(&Text::new(format!("{:.1}%", share * 100.0), at(mid, radius * 0.6), pct_style))?;
        }
    }
    Ok(())
}

fn format_tick(v: f64) -> String {
    if v.abs() >= 1e5 || (v != 0.0 && v.abs() < 1e-3) {
        format!("{:.2e}", v)
    } else if v.fract().abs() < 1e-9 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.3}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
