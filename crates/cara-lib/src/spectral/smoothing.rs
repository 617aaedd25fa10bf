use super::welch::SpectralEstimate;
use crate::error::ConfigError;
use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Shape of the FIR kernel used to smooth spectra along frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingKernel {
    Rectangular,
    Triangular,
}

impl FromStr for SmoothingKernel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rectangular" | "rect" | "boxcar" => Ok(SmoothingKernel::Rectangular),
            "triangular" | "triang" => Ok(SmoothingKernel::Triangular),
            _ => Err(ConfigError::UnknownKernel(s.to_string())),
        }
    }
}

impl SmoothingKernel {
    /// Kernel taps normalised to unit sum.
    pub fn taps(&self, n_taps: usize) -> Result<Vec<f64>, ConfigError> {
        if n_taps == 0 {
            return Err(ConfigError::NoTaps);
        }
        let raw: Vec<f64> = match self {
            SmoothingKernel::Rectangular => vec![1.0; n_taps],
            SmoothingKernel::Triangular => triangular(n_taps),
        };
        let total: f64 = raw.iter().sum();
        Ok(raw.into_iter().map(|w| w / total).collect())
    }
}

fn triangular(n: usize) -> Vec<f64> {
    let half: Vec<f64> = (1..=(n + 1) / 2)
        .map(|i| {
            if n % 2 == 0 {
                (2.0 * i as f64 - 1.0) / n as f64
            } else {
                2.0 * i as f64 / (n as f64 + 1.0)
            }
        })
        .collect();
    let mirrored = if n % 2 == 0 {
        half.iter().rev().copied().collect::<Vec<_>>()
    } else {
        half.iter().rev().skip(1).copied().collect::<Vec<_>>()
    };
    half.into_iter().chain(mirrored).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub kernel: SmoothingKernel,
    pub n_taps: usize,
    /// Filter with bin 0 replaced by bin 1, then put the original DC value back.
    pub keep_first_unfiltered: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            kernel: SmoothingKernel::Rectangular,
            n_taps: 2,
            keep_first_unfiltered: true,
        }
    }
}

/// Zero-phase smoothing of every spectrum of `estimate` along the frequency axis.
pub fn smooth(
    estimate: &SpectralEstimate,
    cfg: &SmoothingConfig,
) -> Result<SpectralEstimate, ConfigError> {
    let taps = cfg.kernel.taps(cfg.n_taps)?;
    let keep = cfg.keep_first_unfiltered;
    Ok(SpectralEstimate {
        sxx: smooth_real(&estimate.sxx, &taps, keep),
        syy: smooth_real(&estimate.syy, &taps, keep),
        sxy: smooth_complex(&estimate.sxy, &taps, keep),
        syx: smooth_complex(&estimate.syx, &taps, keep),
        ..estimate.clone()
    })
}

fn smooth_real(values: &[f64], taps: &[f64], keep_first: bool) -> Vec<f64> {
    if !keep_first || values.len() < 2 {
        return filtfilt(taps, values);
    }
    let mut work = values.to_vec();
    work[0] = values[1];
    let mut out = filtfilt(taps, &work);
    out[0] = values[0];
    out
}

fn smooth_complex(values: &[Complex64], taps: &[f64], keep_first: bool) -> Vec<Complex64> {
    let re: Vec<f64> = values.iter().map(|c| c.re).collect();
    let im: Vec<f64> = values.iter().map(|c| c.im).collect();
    smooth_real(&re, taps, keep_first)
        .into_iter()
        .zip(smooth_real(&im, taps, keep_first))
        .map(|(re, im)| Complex64::new(re, im))
        .collect()
}

/// Forward-backward FIR filtering with odd reflection padding and
/// steady-state initial conditions.
pub fn filtfilt(taps: &[f64], x: &[f64]) -> Vec<f64> {
    if x.len() < 2 || taps.len() < 2 {
        return x.iter().map(|v| v * taps.iter().sum::<f64>()).collect();
    }
    let edge = (3 * taps.len()).min(x.len() - 1);
    let last = x.len() - 1;
    let mut ext = Vec::with_capacity(x.len() + 2 * edge);
    ext.extend((1..=edge).rev().map(|i| 2.0 * x[0] - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=edge).map(|i| 2.0 * x[last] - x[last - i]));

    let zi = steady_state(taps);
    let forward = lfilter(taps, &ext, &zi, ext[0]);
    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let backward = lfilter(taps, &reversed, &zi, reversed[0]);
    let mut out: Vec<f64> = backward.into_iter().rev().collect();
    out.truncate(out.len() - edge);
    out.drain(..edge);
    out
}

fn steady_state(taps: &[f64]) -> Vec<f64> {
    (0..taps.len() - 1)
        .map(|i| taps[i + 1..].iter().sum())
        .collect()
}

/// Transposed direct-form FIR filter with initial state `zi * x0`.
fn lfilter(taps: &[f64], x: &[f64], zi: &[f64], x0: f64) -> Vec<f64> {
    let mut state: Vec<f64> = zi.iter().map(|z| z * x0).collect();
    let order = state.len();
    let mut out = Vec::with_capacity(x.len());
    for &sample in x {
        out.push(taps[0] * sample + state[0]);
        for i in 0..order {
            let next = if i + 1 < order { state[i + 1] } else { 0.0 };
            state[i] = taps[i + 1] * sample + next;
        }
    }
    out
}
