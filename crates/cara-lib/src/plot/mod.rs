//! Backend-neutral figures for step responses and transfer functions.

use crate::ari::AutoregulationFit;
use crate::tfa::{Band, CriticalCoherence, TransferFunctionEstimate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

/// 0xRRGGBB
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

const PATIENT: Color = Color(0x1F4E9A);
const MODEL: Color = Color(0xD2461E);
const BAND_MEAN: Color = Color(0x2E8B57);
const THRESHOLD: Color = Color(0x808080);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.to_string());
        self.y.label = Some(y.to_string());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every point, `None` for an empty figure.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|series| match series {
            Series::Line(line) => line.points.iter(),
        });
        let first = points.next()?;
        Some(points.fold(
            (first[0], first[0], first[1], first[1]),
            |(x0, x1, y0, y1), p| (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1])),
        ))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    (0..max_points)
        .map(|i| (i as f64 * bucket_size).floor() as usize)
        .take_while(|&start| start < points.len())
        .map(|start| points[start])
        .collect()
}

/// Points with an unknown coordinate cannot be drawn and are left out.
fn known_points(x: &[f64], y: &[f64]) -> Vec<[f64; 2]> {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| [*a, *b])
        .collect()
}

/// Patient step response, overlaid with the best reference model when assessable.
pub fn figure_from_fit(fit: &AutoregulationFit) -> Figure {
    let title = match (fit.ari_int(), fit.ari_frac()) {
        (Some(int), Some(frac)) => format!("Step response, ARI {int} ({frac:.2})"),
        _ => "Step response (ARI not assessable)".to_string(),
    };
    let mut fig = Figure::new(Some(title)).with_labels("time (s)", "normalised flow");
    fig.add_series(Series::Line(LineSeries {
        name: "patient".into(),
        points: known_points(&fit.time_vals, &fit.step_response),
        style: Style {
            width: 2.0,
            dash: None,
            color: PATIENT,
        },
    }));
    if let (Some(curve), Some(ari)) = (fit.best_fit_curve(), fit.ari_int()) {
        fig.add_series(Series::Line(LineSeries {
            name: format!("model ARI {ari}"),
            points: known_points(&fit.time_vals, curve),
            style: Style {
                width: 1.5,
                dash: Some([6.0, 4.0]),
                color: MODEL,
            },
        }));
    }
    fig
}

/// Quantity drawn against frequency by [`figure_from_transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlot {
    Gain,
    Phase,
    Coherence,
}

/// Thresholded gain, phase (degrees) or raw coherence up to `max_freq` Hz,
/// with each reported band's mean as a dashed segment. The coherence figure
/// also carries the critical coherence when one applies.
pub fn figure_from_transfer(
    tf: &TransferFunctionEstimate,
    quantity: TransferPlot,
    max_freq: f64,
    max_points: usize,
) -> Figure {
    let (title, label, values) = match quantity {
        TransferPlot::Gain => ("Gain", tf.unit.clone(), tf.gain(true)),
        TransferPlot::Phase => (
            "Phase",
            "degrees".to_string(),
            tf.phase(true, true).iter().map(|p| p.to_degrees()).collect(),
        ),
        TransferPlot::Coherence => ("Coherence", String::new(), tf.coherence(false)),
    };
    let upper = tf.freq.iter().take_while(|f| **f <= max_freq).count();
    let points = known_points(&tf.freq[..upper], &values[..upper]);
    let mut fig = Figure::new(Some(format!("{title} ({})", tf.estimator)))
        .with_labels("frequency (Hz)", &label);
    fig.add_series(Series::Line(LineSeries {
        name: title.to_lowercase(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.4,
            dash: None,
            color: PATIENT,
        },
    }));
    let x_max = max_freq.min(tf.freq.last().copied().unwrap_or(0.0));
    for band in Band::REPORTED {
        let (lo, hi) = band.range(&tf.freq);
        if lo > x_max {
            continue;
        }
        let Some(stats) = tf.statistics(&values, band) else {
            continue;
        };
        fig.add_series(Series::Line(LineSeries {
            name: format!("{band} mean"),
            points: vec![[lo, stats.mean], [hi.min(x_max), stats.mean]],
            style: Style {
                width: 2.0,
                dash: Some([8.0, 4.0]),
                color: BAND_MEAN,
            },
        }));
    }
    if quantity == TransferPlot::Coherence {
        if let CriticalCoherence::Value(critical) = tf.critical_coherence() {
            fig.add_series(Series::Line(LineSeries {
                name: format!("critical ({})", tf.significance),
                points: vec![[0.0, critical], [x_max, critical]],
                style: Style {
                    width: 1.0,
                    dash: Some([3.0, 3.0]),
                    color: THRESHOLD,
                },
            }));
        }
    }
    fig
}
