//! Three panel diagnostic plots for a single comparison.
//!
//! Panel one is a histogram of reference values, panel two a scatter of test against reference
//! with the identity line, panel three a histogram of relative differences. Plots are rendered to
//! SVG so no font or image libraries are needed.
//!
use std::ops::Range;

use ndarray::ArrayViewD;
use plotters::prelude::*;
use rand::{rngs::StdRng, seq::index, SeedableRng};

use crate::compare::{ComparisonRecord, Pairs};
use crate::errors::{Error, Result};

/// Number of bins in each histogram
pub const HISTOGRAM_BINS: usize = 50;

/// Scatter plots are drawn from at most this many points.
pub const MAX_SCATTER_POINTS: usize = 10_000;

const SAMPLE_SEED: u64 = 0x6763_7661_6c;
const WIDTH: u32 = 1800;
const HEIGHT: u32 = 600;

/// Value counts over equal width bins spanning `[lower, upper]`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub lower: f64,
    pub upper: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Non-finite values are ignored. If all values are equal the range is widened by 0.5, or by
    /// a millionth of the value if that is larger, on each side so the single bar is visible.
    ///
    pub fn new(values: &[f64], bins: usize) -> Self {
        let finite = values.iter().copied().filter(|v| v.is_finite());
        let (lower, upper) = finite
            .clone()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let (lower, upper) = if lower > upper {
            (0.0, 1.0)
        } else if lower == upper {
            let pad = 0.5_f64.max(lower.abs() * 1e-6);
            (lower - pad, upper + pad)
        } else {
            (lower, upper)
        };

        let mut counts = vec![0; bins];
        let width = bin_width(lower, upper, bins);
        for value in finite {
            let bin = ((value - lower) / width) as usize;
            counts[bin.min(bins - 1)] += 1;
        }

        Self {
            lower,
            upper,
            counts,
        }
    }

    pub fn bin_width(&self) -> f64 {
        bin_width(self.lower, self.upper, self.counts.len())
    }

    /// `(left edge, right edge, count)` for each bin
    pub fn bars(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        let width = self.bin_width();
        self.counts.iter().enumerate().map(move |(i, &count)| {
            let left = self.lower + i as f64 * width;
            (left, left + width, count)
        })
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

// The span of values at opposite ends of the f64 range overflows to infinity.
fn bin_width(lower: f64, upper: f64, bins: usize) -> f64 {
    let bins = bins as f64;
    let span = upper - lower;
    if span.is_finite() {
        span / bins
    } else {
        upper / bins - lower / bins
    }
}

/// The data behind one diagnostic plot, reduced to what is needed for drawing.
///
#[derive(Clone, Debug)]
pub struct Diagnostics {
    pub reference: Histogram,
    pub scatter: Vec<(f64, f64)>,
    pub relative: Histogram,
}

impl Diagnostics {
    /// The reference histogram is drawn from every non-NaN value of the `reference` slice, even
    /// where the test value is missing. The scatter and relative differences use the jointly
    /// valid `pairs`.
    ///
    pub fn new(reference: &ArrayViewD<f64>, pairs: &Pairs) -> Self {
        let distribution: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
        let reference = pairs.reference();
        let test = pairs.test();

        let scatter = if pairs.len() > MAX_SCATTER_POINTS {
            let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
            index::sample(&mut rng, pairs.len(), MAX_SCATTER_POINTS)
                .iter()
                .map(|i| (reference[i], test[i]))
                .collect()
        } else {
            reference.iter().copied().zip(test.iter().copied()).collect()
        };

        Self {
            reference: Histogram::new(&distribution, HISTOGRAM_BINS),
            scatter,
            relative: Histogram::new(&pairs.relative_differences(), HISTOGRAM_BINS),
        }
    }
}

/// File name, relative to the plot directory, of the plot for a comparison
pub fn file_name(record: &ComparisonRecord) -> String {
    format!("{}_{}_comparison.svg", record.species, record.file_id)
}

fn plot_error<E: std::fmt::Display>(err: E) -> Error {
    Error::Plot(err.to_string())
}

/// An axis needs a finite, non-empty range.
fn axis_range(lower: f64, upper: f64) -> Result<Range<f64>> {
    if (upper - lower).is_finite() && upper > lower {
        Ok(lower..upper)
    } else {
        Err(Error::Plot(format!(
            "unable to plot values spanning [{lower:e}, {upper:e}]"
        )))
    }
}

/// Render the three panel plot for `record` as an SVG document.
///
pub fn render(record: &ComparisonRecord, diagnostics: &Diagnostics) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let (verdict, color) = if record.passed {
            ("PASS", RGBColor(0, 128, 0))
        } else {
            ("FAIL", RED)
        };
        let title = format!(
            "{} - {} - Validation: {verdict}",
            record.species, record.file_id
        );
        let root = root
            .titled(&title, ("sans-serif", 28).into_font().color(&color))
            .map_err(plot_error)?;

        let panels = root.split_evenly((1, 3));
        draw_histogram(
            &panels[0],
            &format!("Reference Distribution: {}", record.species),
            "Value",
            &diagnostics.reference,
        )?;
        draw_scatter(&panels[1], record, &diagnostics.scatter)?;
        draw_histogram(
            &panels[2],
            &format!("Relative Differences: {}", record.species),
            "Relative Difference",
            &diagnostics.relative,
        )?;

        root.present().map_err(plot_error)?;
    }

    Ok(svg)
}

fn draw_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    caption: &str,
    x_label: &str,
    histogram: &Histogram,
) -> Result<()> {
    let x_range = axis_range(histogram.lower, histogram.upper)?;
    let y_max = (histogram.max_count() as f64 * 1.05).max(1.0);
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0.0..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc("Frequency")
        .x_label_formatter(&|x| format!("{x:.3e}"))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(histogram.bars().map(|(left, right, count)| {
            Rectangle::new([(left, 0.0), (right, count as f64)], BLUE.mix(0.6).filled())
        }))
        .map_err(plot_error)?;

    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    record: &ComparisonRecord,
    points: &[(f64, f64)],
) -> Result<()> {
    let (lower, upper) = points
        .iter()
        .flat_map(|&(x, y)| [x, y])
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let (lower, upper) = if lower > upper {
        (0.0, 1.0)
    } else {
        let pad = ((upper - lower) * 0.05).max(upper.abs().max(1e-30) * 1e-6);
        (lower - pad, upper + pad)
    };
    let range = axis_range(lower, upper)?;

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("Reference vs Test: {}", record.species),
            ("sans-serif", 18),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(range.clone(), range)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Reference Value")
        .y_desc("Test Value")
        .x_label_formatter(&|x| format!("{x:.3e}"))
        .y_label_formatter(&|y| format!("{y:.3e}"))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(
            vec![(lower, lower), (upper, upper)],
            RED.mix(0.75),
        ))
        .map_err(plot_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&point| Circle::new(point, 2, BLUE.mix(0.5).filled())),
        )
        .map_err(plot_error)?;

    let stats = &record.statistics;
    let annotation = [
        format!("Correlation: {:.6}", stats.corr_coef),
        format!("RMSE: {:.6e}", stats.rmse),
    ];
    for (i, line) in annotation.iter().enumerate() {
        area.draw(&Text::new(
            line.clone(),
            (100, 60 + 20 * i as i32),
            ("sans-serif", 14).into_font(),
        ))
        .map_err(plot_error)?;
    }

    Ok(())
}
