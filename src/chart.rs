// 📊 Chart Renderer - standardized price / sales lines as PNG
// Z-scores are computed over the whole dataset before the area filter is
// applied, so one area's curve depends on every other area's data too.

use chrono::NaiveDate;
use image::{ImageFormat, Rgb, RgbImage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, AnalysisResult};
use crate::transform::Column;

/// Variables drawn on the chart, in legend order
pub const VARIABLES: [Column; 2] = [Column::AveragePrice, Column::HousesSold];

pub mod colors {
    use image::Rgb;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const LIGHT_GRAY: Rgb<u8> = Rgb([200, 200, 200]);
    pub const BLUE: Rgb<u8> = Rgb([31, 119, 180]);
    pub const ORANGE: Rgb<u8> = Rgb([255, 127, 14]);
}

// ============================================================================
// DATA PREPARATION
// ============================================================================

/// Mean-centered, unit-variance scores (population std).
/// Missing inputs stay missing and are left out of the mean and deviation.
/// A column with no spread has no defined score, so every value comes back `None`.
pub fn zscore(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return vec![None; values.len()];
    }

    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let std = (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

    if std == 0.0 || !std.is_finite() {
        return vec![None; values.len()];
    }

    values
        .iter()
        .map(|v| v.map(|v| (v - mean) / std))
        .collect()
}

/// Long-form row: one value of one variable on one date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRecord {
    pub date: NaiveDate,
    pub variable: &'static str,
    pub value: Option<f64>,
}

/// Z-score both variables over the full table, keep `area`, then melt.
/// Output holds every `average_price` row first, then every `houses_sold` row.
pub fn standardized_long_frame(dataset: &Dataset, area: &str) -> Vec<LongRecord> {
    let rows = dataset.rows();
    let mut long = Vec::new();

    for column in VARIABLES {
        let raw: Vec<Option<f64>> = rows.iter().map(|r| column.get(r)).collect();
        let scores = zscore(&raw);

        long.extend(
            rows.iter()
                .zip(scores)
                .filter(|(row, _)| row.area == area)
                .map(|(row, value)| LongRecord {
                    date: row.date,
                    variable: column.name(),
                    value,
                }),
        );
    }

    long
}

/// Plottable line for one variable: sorted by date, missing values skipped,
/// repeated dates averaged.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    pub variable: &'static str,
    pub points: Vec<(NaiveDate, f64)>,
}

pub fn line_series(records: &[LongRecord]) -> Vec<LineSeries> {
    VARIABLES
        .iter()
        .map(|column| {
            let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
            for rec in records.iter().filter(|r| r.variable == column.name()) {
                if let Some(v) = rec.value {
                    let entry = by_date.entry(rec.date).or_insert((0.0, 0));
                    entry.0 += v;
                    entry.1 += 1;
                }
            }

            LineSeries {
                variable: column.name(),
                points: by_date
                    .into_iter()
                    .map(|(date, (sum, count))| (date, sum / count as f64))
                    .collect(),
            }
        })
        .collect()
}

// ============================================================================
// CANVAS
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub background: Rgb<u8>,
    pub axis_color: Rgb<u8>,
    pub grid_color: Rgb<u8>,
    pub line_colors: [Rgb<u8>; 2],
    pub ticks: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            margin: 48,
            background: colors::WHITE,
            axis_color: colors::BLACK,
            grid_color: colors::LIGHT_GRAY,
            line_colors: [colors::BLUE, colors::ORANGE],
            ticks: 5,
        }
    }
}

/// A single figure. Each render builds its own canvas and `into_png`
/// consumes it, so nothing survives between requests.
pub struct ChartCanvas {
    config: ChartConfig,
    img: RgbImage,
}

impl ChartCanvas {
    pub fn new(config: ChartConfig) -> Self {
        let img = RgbImage::from_pixel(config.width, config.height, config.background);
        Self { config, img }
    }

    fn plot_left(&self) -> i64 {
        self.config.margin as i64
    }

    fn plot_right(&self) -> i64 {
        self.config.width as i64 - self.config.margin as i64
    }

    fn plot_top(&self) -> i64 {
        self.config.margin as i64 / 2
    }

    fn plot_bottom(&self) -> i64 {
        self.config.height as i64 - self.config.margin as i64
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        let (width, height) = (self.img.width() as i64, self.img.height() as i64);
        if (0..width).contains(&x) && (0..height).contains(&y) {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Bresenham line, clipped to the image
    fn draw_line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
        let dx = (x2 - x1).abs();
        let dy = (y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };
        let mut err = dx - dy;

        let (mut x, mut y) = (x1, y1);
        loop {
            self.put(x, y, color);
            if x == x2 && y == y2 {
                break;
            }

            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn draw_thick_line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
        for offset in -1..=1 {
            self.draw_line(x1, y1 + offset, x2, y2 + offset, color);
            self.draw_line(x1 + offset, y1, x2 + offset, y2, color);
        }
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
        for py in y..y + h {
            for px in x..x + w {
                self.put(px, py, color);
            }
        }
    }

    fn draw_axes(&mut self, y_range: (f64, f64)) {
        let (left, right) = (self.plot_left(), self.plot_right());
        let (top, bottom) = (self.plot_top(), self.plot_bottom());
        let axis = self.config.axis_color;
        let grid = self.config.grid_color;

        // zero baseline sits under everything else
        if y_range.0 < 0.0 && y_range.1 > 0.0 {
            let y0 = self.map_y(0.0, y_range);
            self.draw_line(left, y0, right, y0, grid);
        }

        self.draw_line(left, top, right, top, axis);
        self.draw_line(left, bottom, right, bottom, axis);
        self.draw_line(left, top, left, bottom, axis);
        self.draw_line(right, top, right, bottom, axis);

        let ticks = self.config.ticks.max(1) as i64;
        for i in 0..=ticks {
            let x = left + (right - left) * i / ticks;
            self.draw_line(x, bottom, x, bottom + 5, axis);
            let y = bottom - (bottom - top) * i / ticks;
            self.draw_line(left - 5, y, left, y, axis);
        }
    }

    fn draw_legend(&mut self) {
        let colors = self.config.line_colors;
        let x = self.plot_right() - 40;
        let mut y = self.plot_top() + 10;
        for color in colors {
            self.fill_rect(x, y, 28, 6, color);
            y += 14;
        }
    }

    fn map_x(&self, day: i64, x_range: (i64, i64)) -> i64 {
        let (left, right) = (self.plot_left(), self.plot_right());
        let span = (x_range.1 - x_range.0).max(1);
        left + (right - left) * (day - x_range.0) / span
    }

    fn map_y(&self, value: f64, y_range: (f64, f64)) -> i64 {
        let (top, bottom) = (self.plot_top(), self.plot_bottom());
        let t = (value - y_range.0) / (y_range.1 - y_range.0);
        bottom - ((bottom - top) as f64 * t).round() as i64
    }

    /// Draw every series onto the canvas. An empty slice draws bare axes.
    pub fn plot(&mut self, series: &[LineSeries]) {
        let x_range = date_range(series);
        let y_range = value_range(series);

        self.draw_axes(y_range);

        for (idx, line) in series.iter().enumerate() {
            let color = self.config.line_colors[idx % self.config.line_colors.len()];
            let pixels: Vec<(i64, i64)> = line
                .points
                .iter()
                .map(|(date, v)| {
                    (
                        self.map_x(day_number(*date), x_range),
                        self.map_y(*v, y_range),
                    )
                })
                .collect();

            match pixels.as_slice() {
                [] => {}
                [(x, y)] => self.fill_rect(x - 2, y - 2, 5, 5, color),
                _ => {
                    for pair in pixels.windows(2) {
                        let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
                        self.draw_thick_line(x1, y1, x2, y2, color);
                    }
                }
            }
        }

        self.draw_legend();
    }

    /// Encode as PNG and release the canvas
    pub fn into_png(self) -> AnalysisResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.img
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| AnalysisError::Encoding(e.to_string()))?;
        Ok(bytes)
    }
}

fn day_number(date: NaiveDate) -> i64 {
    use chrono::Datelike;
    date.num_days_from_ce() as i64
}

fn date_range(series: &[LineSeries]) -> (i64, i64) {
    let days = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(d, _)| day_number(*d)));
    let (min, max) = days.fold((i64::MAX, i64::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));

    if min > max {
        (0, 1)
    } else if min == max {
        (min - 1, max + 1)
    } else {
        (min, max)
    }
}

fn value_range(series: &[LineSeries]) -> (f64, f64) {
    let values = series.iter().flat_map(|s| s.points.iter().map(|(_, v)| *v));
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if min > max {
        (-1.0, 1.0)
    } else if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        let pad = (max - min) * 0.05;
        (min - pad, max + pad)
    }
}

/// Full pipeline for one area: standardize, melt, draw, encode.
/// An area with no rows still yields a valid (empty) chart.
pub fn render_area_chart(dataset: &Dataset, area: &str) -> AnalysisResult<Vec<u8>> {
    let long = standardized_long_frame(dataset, area);
    let series = line_series(&long);

    let mut canvas = ChartCanvas::new(ChartConfig::default());
    canvas.plot(&series);
    let png = canvas.into_png()?;

    debug!(area, records = long.len(), bytes = png.len(), "chart rendered");
    Ok(png)
}
