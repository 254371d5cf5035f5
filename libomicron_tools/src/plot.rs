//! PNG rendering of the scheduler and latency diagnostics.
//!
//! The figures carry no text. Axes have a tick at every grid line, and a row of colour
//! swatches along the top margin keys the series in order: job classes (manager, process,
//! post-process) on the condor plot, file types in configuration order on the latency plot.
//! Each coverage row of the latency timeline is keyed by a swatch in the left margin, in the
//! order expected, available, pending, unresolvable, missing, overlapping.
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use std::path::Path;

use super::coverage::ChannelCoverage;
use super::error::PlotError;
use super::gps::unix_to_gps;
use super::latency_archive::LatencySample;
use super::scheduler::{Job, JobClass};
use super::segments::{Segment, SegmentList};

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 700;
const MARGIN: u32 = 50;
const N_GRID_LINES: u32 = 5;
const TICK: u32 = 6;
const SWATCH: u32 = 14;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

/// Line colours for successive series (file types)
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
];

/// Colours of the coverage rows: expected, available, pending, unresolvable, missing, overlapping
const COVERAGE_COLORS: [Rgb<u8>; 6] = [
    Rgb([160, 160, 160]),
    Rgb([44, 160, 44]),
    Rgb([31, 119, 180]),
    Rgb([255, 190, 60]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
];

fn class_color(class: JobClass) -> Rgb<u8> {
    match class {
        JobClass::Manager => PALETTE[3],
        JobClass::Process => PALETTE[0],
        JobClass::PostProcess => PALETTE[1],
    }
}

/// Position of the i-th swatch of the colour key in the top margin
fn key_swatch(index: usize) -> Rect {
    let x = MARGIN + index as u32 * 2 * SWATCH;
    Rect::at(x as i32, ((MARGIN - SWATCH) / 2) as i32).of_size(SWATCH, SWATCH)
}

fn draw_key(canvas: &mut RgbImage, colors: &[Rgb<u8>]) {
    for (index, color) in colors.iter().enumerate() {
        draw_filled_rect_mut(canvas, key_swatch(index), *color);
    }
}

/// Make sure a range has a non-zero width so it can be mapped onto pixels
fn widen(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        (min, max)
    } else {
        (min - 0.5, min + 0.5)
    }
}

/// A rectangular panel of the canvas mapping data coordinates onto pixels
#[derive(Debug, Clone, Copy)]
struct Axes {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Axes {
    fn x(&self, value: f64) -> f32 {
        let (min, max) = self.x_range;
        let frac = ((value - min) / (max - min)).clamp(0.0, 1.0);
        self.left as f32 + (frac * self.width as f64) as f32
    }

    fn y(&self, value: f64) -> f32 {
        let (min, max) = self.y_range;
        let frac = ((value - min) / (max - min)).clamp(0.0, 1.0);
        (self.top + self.height) as f32 - (frac * self.height as f64) as f32
    }

    fn draw_frame(&self, canvas: &mut RgbImage) {
        let bottom = (self.top + self.height) as f32;
        for i in 0..=N_GRID_LINES {
            let y = self.top as f32 + (i * self.height / N_GRID_LINES) as f32;
            let x = self.left as f32 + (i * self.width / N_GRID_LINES) as f32;
            if i > 0 && i < N_GRID_LINES {
                draw_line_segment_mut(
                    canvas,
                    (self.left as f32, y),
                    ((self.left + self.width) as f32, y),
                    GRID,
                );
                draw_line_segment_mut(canvas, (x, self.top as f32), (x, bottom), GRID);
            }
            let left = self.left as f32;
            draw_line_segment_mut(canvas, (left - TICK as f32, y), (left, y), BLACK);
            draw_line_segment_mut(canvas, (x, bottom), (x, bottom + TICK as f32), BLACK);
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(self.left as i32, self.top as i32).of_size(self.width, self.height),
            BLACK,
        );
    }

    /// Draw a horizontal bar for a segment within one row of a timeline
    fn draw_span(
        &self,
        canvas: &mut RgbImage,
        segment: &Segment,
        row: u32,
        n_rows: u32,
        color: Rgb<u8>,
    ) {
        let row_height = (self.height / n_rows.max(1)).max(1);
        let x0 = self.x(segment.start);
        let x1 = self.x(segment.end);
        let bar_width = ((x1 - x0).round() as u32).max(1);
        let y = self.top + row * row_height + row_height / 4;
        draw_filled_rect_mut(
            canvas,
            Rect::at(x0 as i32, y as i32).of_size(bar_width, (row_height / 2).max(1)),
            color,
        );
    }

    /// Draw the swatch keying a timeline row in the left margin
    fn draw_row_key(&self, canvas: &mut RgbImage, row: u32, n_rows: u32, color: Rgb<u8>) {
        let row_height = (self.height / n_rows.max(1)).max(1);
        let x = self.left - TICK - 4 - SWATCH;
        let y = self.top + row * row_height + row_height / 4;
        draw_filled_rect_mut(
            canvas,
            Rect::at(x as i32, y as i32).of_size(SWATCH, (row_height / 2).max(1)),
            color,
        );
    }
}

/// Scatter of job duration (hours) against job start (GPS), coloured by job class
pub fn render_condor_plot(jobs: &[Job], now_unix: i64, path: &Path) -> Result<(), PlotError> {
    let points: Vec<(f64, f64, JobClass)> = jobs
        .iter()
        .filter_map(|job| {
            let start = job.job_start_date?;
            let duration = job.duration(now_unix)?;
            Some((unix_to_gps(start), duration as f64 / 3600.0, job.class))
        })
        .collect();

    let now_gps = unix_to_gps(now_unix);
    let x_min = points.iter().map(|p| p.0).fold(now_gps, f64::min);
    let y_max = points.iter().map(|p| p.1).fold(1.0, f64::max) * 1.1;
    let axes = Axes {
        left: MARGIN,
        top: MARGIN,
        width: WIDTH - 2 * MARGIN,
        height: HEIGHT - 2 * MARGIN,
        x_range: widen(x_min, now_gps),
        y_range: (0.0, y_max),
    };

    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);
    axes.draw_frame(&mut canvas);
    let key: Vec<Rgb<u8>> = JobClass::all().into_iter().map(class_color).collect();
    draw_key(&mut canvas, &key);
    for (x, y, class) in points {
        draw_filled_circle_mut(
            &mut canvas,
            (axes.x(x) as i32, axes.y(y) as i32),
            4,
            class_color(class),
        );
    }
    canvas.save(path)?;
    log::debug!("Condor plot written to {}", path.to_string_lossy());
    Ok(())
}

/// Latency trend (upper panel) and coverage timeline (lower panel) for one channel.
///
/// `histories` pairs each file type with its archived latency samples; `coverages` holds the
/// classification of every file type for this channel over `span`.
pub fn render_latency_plot(
    histories: &[(String, Vec<LatencySample>)],
    coverages: &[&ChannelCoverage],
    span: &Segment,
    path: &Path,
) -> Result<(), PlotError> {
    let panel_height = (HEIGHT - 3 * MARGIN) / 2;
    let samples = histories.iter().flat_map(|(_, h)| h.iter());
    let (mut t_min, mut t_max, mut l_max) = (f64::INFINITY, f64::NEG_INFINITY, 1.0_f64);
    for sample in samples {
        t_min = t_min.min(sample.gps);
        t_max = t_max.max(sample.gps);
        if sample.latency_hours.is_finite() {
            l_max = l_max.max(sample.latency_hours);
        }
    }
    if !t_min.is_finite() {
        (t_min, t_max) = (span.start, span.end);
    }

    let trend = Axes {
        left: MARGIN,
        top: MARGIN,
        width: WIDTH - 2 * MARGIN,
        height: panel_height,
        x_range: widen(t_min, t_max),
        y_range: (0.0, l_max * 1.1),
    };
    let timeline = Axes {
        top: 2 * MARGIN + panel_height,
        x_range: widen(span.start, span.end),
        y_range: (0.0, 1.0),
        ..trend
    };

    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);
    trend.draw_frame(&mut canvas);
    timeline.draw_frame(&mut canvas);
    let key: Vec<Rgb<u8>> = (0..histories.len())
        .map(|index| PALETTE[index % PALETTE.len()])
        .collect();
    draw_key(&mut canvas, &key);

    for (index, (_, history)) in histories.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        // Unknown latency (NaN) breaks the line
        for pair in history.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.latency_hours.is_finite() && b.latency_hours.is_finite() {
                draw_line_segment_mut(
                    &mut canvas,
                    (trend.x(a.gps), trend.y(a.latency_hours)),
                    (trend.x(b.gps), trend.y(b.latency_hours)),
                    color,
                );
            }
        }
        for sample in history.iter().filter(|s| s.latency_hours.is_finite()) {
            draw_filled_circle_mut(
                &mut canvas,
                (trend.x(sample.gps) as i32, trend.y(sample.latency_hours) as i32),
                2,
                color,
            );
        }
    }

    let n_rows = (coverages.len() * COVERAGE_COLORS.len()) as u32;
    for (index, coverage) in coverages.iter().enumerate() {
        let rows: [&SegmentList; 6] = [
            &coverage.expected,
            &coverage.available,
            &coverage.pending,
            &coverage.unresolvable,
            &coverage.missing,
            &coverage.overlapping,
        ];
        for (offset, (list, color)) in rows.iter().zip(COVERAGE_COLORS).enumerate() {
            let row = (index * COVERAGE_COLORS.len() + offset) as u32;
            timeline.draw_row_key(&mut canvas, row, n_rows, color);
            for segment in list.iter() {
                timeline.draw_span(&mut canvas, segment, row, n_rows, color);
            }
        }
    }

    canvas.save(path)?;
    log::debug!("Latency plot written to {}", path.to_string_lossy());
    Ok(())
}
