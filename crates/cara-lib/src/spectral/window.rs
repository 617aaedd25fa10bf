use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

const TUKEY_ALPHA: f64 = 0.5;

/// Taper applied to every Welch segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Rectangular,
    Hann,
    Hamming,
    Tukey,
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::Hann
    }
}

impl FromStr for WindowType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rectangular" | "rect" | "boxcar" => Ok(WindowType::Rectangular),
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "tukey" => Ok(WindowType::Tukey),
            _ => Err(ConfigError::UnknownWindow(s.to_string())),
        }
    }
}

impl WindowType {
    /// Periodic (DFT-even) window of `size` samples.
    pub fn build(&self, size: usize) -> Vec<f64> {
        if size <= 1 {
            return vec![1.0; size];
        }
        match self {
            WindowType::Rectangular => vec![1.0; size],
            WindowType::Hann => cosine_sum(size, 0.5, 0.5),
            WindowType::Hamming => cosine_sum(size, 0.54, 0.46),
            WindowType::Tukey => {
                let mut w = tukey_symmetric(size + 1, TUKEY_ALPHA);
                w.truncate(size);
                w
            }
        }
    }
}

fn cosine_sum(size: usize, a0: f64, a1: f64) -> Vec<f64> {
    (0..size)
        .map(|i| a0 - a1 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

fn tukey_symmetric(size: usize, alpha: f64) -> Vec<f64> {
    let m = size as f64 - 1.0;
    let width = (alpha * m / 2.0).floor() as usize;
    (0..size)
        .map(|n| {
            let x = n as f64;
            if n <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * x / alpha / m)).cos())
            } else if n < size - width - 1 {
                1.0
            } else {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * x / alpha / m)).cos())
            }
        })
        .collect()
}

/// Trend removed from every segment before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detrend {
    None,
    Constant,
    Linear,
}

impl Default for Detrend {
    fn default() -> Self {
        Detrend::Constant
    }
}

impl FromStr for Detrend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(Detrend::None),
            "constant" | "mean" => Ok(Detrend::Constant),
            "linear" => Ok(Detrend::Linear),
            _ => Err(ConfigError::UnknownDetrend(s.to_string())),
        }
    }
}

impl Detrend {
    pub fn apply(&self, segment: &[f64]) -> Vec<f64> {
        match self {
            Detrend::None => segment.to_vec(),
            Detrend::Constant => {
                if segment.is_empty() {
                    return Vec::new();
                }
                let mean = segment.iter().sum::<f64>() / segment.len() as f64;
                segment.iter().map(|x| x - mean).collect()
            }
            Detrend::Linear => {
                let (slope, intercept) = linear_fit(segment);
                segment
                    .iter()
                    .enumerate()
                    .map(|(i, &y)| y - (slope * i as f64 + intercept))
                    .collect()
            }
        }
    }
}

fn linear_fit(segment: &[f64]) -> (f64, f64) {
    let n = segment.len();
    if n < 2 {
        let mean = segment.iter().copied().next().unwrap_or(0.0);
        return (0.0, mean);
    }
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for (i, &y) in segment.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }
    let n_f = n as f64;
    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return (0.0, sum_y / n_f);
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;
    (slope, intercept)
}
