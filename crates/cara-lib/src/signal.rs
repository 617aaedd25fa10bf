use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
    /// Sampling period in seconds.
    pub fn sampling_period(&self) -> f64 {
        1.0 / self.fs
    }
}

/// Checks that a pressure/flow pair can be analysed together.
pub fn check_pair(pressure: &TimeSeries, flow: &TimeSeries) -> Result<(), ConfigError> {
    if !(pressure.fs > 0.0) || !pressure.fs.is_finite() {
        return Err(ConfigError::NonPositiveSamplingRate(pressure.fs));
    }
    if (pressure.fs - flow.fs).abs() > f64::EPSILON * pressure.fs.max(flow.fs) {
        return Err(ConfigError::RateMismatch {
            pressure: pressure.fs,
            flow: flow.fs,
        });
    }
    if pressure.len() != flow.len() {
        return Err(ConfigError::LengthMismatch {
            pressure: pressure.len(),
            flow: flow.len(),
        });
    }
    Ok(())
}

/// Insonated hemisphere a flow channel belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
