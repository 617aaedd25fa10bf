use super::window::{Detrend, WindowType};
use crate::error::{AnalysisError, ConfigError};
use crate::serde_complex;
use crate::signal::{check_pair, TimeSeries};
use log::{debug, warn};
use realfft::num_complex::Complex64;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// Parameters of the segmented (Welch) cross-spectral estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelchConfig {
    /// Fraction of each segment shared with the next one, in [0, 1).
    pub overlap: f64,
    /// Segment duration in seconds.
    pub segment_length_s: f64,
    pub window: WindowType,
    pub detrend: Detrend,
    /// Stretch the overlap so the segments span the whole recording.
    pub adjust_overlap: bool,
}

impl Default for WelchConfig {
    fn default() -> Self {
        Self {
            overlap: 0.5999,
            segment_length_s: 102.4,
            window: WindowType::Hann,
            detrend: Detrend::Constant,
            adjust_overlap: true,
        }
    }
}

/// Averaged auto- and cross-spectra of a pressure (X) / flow (Y) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralEstimate {
    /// Bin frequencies in Hz, `k * fs / segment_length` for every DFT bin.
    pub freq: Vec<f64>,
    pub sxx: Vec<f64>,
    pub syy: Vec<f64>,
    #[serde(with = "serde_complex")]
    pub sxy: Vec<Complex64>,
    #[serde(with = "serde_complex")]
    pub syx: Vec<Complex64>,
    pub n_segments: usize,
    /// Sampling period in seconds.
    pub ts: f64,
    #[serde(default)]
    pub unit_x: Option<String>,
    #[serde(default)]
    pub unit_y: Option<String>,
}

impl SpectralEstimate {
    pub fn segment_length(&self) -> usize {
        self.freq.len()
    }

    pub fn with_units(mut self, unit_x: Option<String>, unit_y: Option<String>) -> Self {
        self.unit_x = unit_x;
        self.unit_y = unit_y;
        self
    }
}

/// Segment geometry derived from the signal length and the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    pub segment_length: usize,
    pub shift: usize,
    pub n_segments: usize,
}

impl SegmentPlan {
    pub fn new(n_samples: usize, fs: f64, cfg: &WelchConfig) -> Result<Self, ConfigError> {
        if !(fs > 0.0) || !fs.is_finite() {
            return Err(ConfigError::NonPositiveSamplingRate(fs));
        }
        if !(0.0..1.0).contains(&cfg.overlap) {
            return Err(ConfigError::InvalidOverlap(cfg.overlap));
        }
        if !(cfg.segment_length_s > 0.0) || !cfg.segment_length_s.is_finite() {
            return Err(ConfigError::NonPositiveSegment(cfg.segment_length_s));
        }
        let segment_length = (fs * cfg.segment_length_s).round() as usize;
        if segment_length == 0 || segment_length > n_samples {
            return Err(ConfigError::SegmentTooLong {
                segment: segment_length,
                signal: n_samples,
            });
        }
        let overlap = if cfg.adjust_overlap {
            adjust_overlap(n_samples, segment_length, cfg.overlap)
        } else {
            cfg.overlap
        };
        let shift = ((1.0 - overlap) * segment_length as f64).round() as usize;
        if shift == 0 {
            return Err(ConfigError::NoSegmentShift {
                overlap,
                segment: segment_length,
            });
        }
        let n_segments = (n_samples - segment_length) / shift + 1;
        Ok(Self {
            segment_length,
            shift,
            n_segments,
        })
    }
}

/// Overlap that makes the segments span the whole recording, keeping at least
/// the requested overlap's number of segments.
pub fn adjust_overlap(n_samples: usize, segment_length: usize, overlap: f64) -> f64 {
    let l = segment_length as f64;
    let span = n_samples.saturating_sub(segment_length) as f64;
    let n_segments = (span / (l * (1.0 - overlap))).floor() + 1.0;
    if n_segments > 1.0 {
        let shift = (span / (n_segments - 1.0)).floor();
        (l - shift) / l
    } else {
        warn!(
            "segment of {} samples leaves room for a single segment in {} samples; overlap kept at {}",
            segment_length, n_samples, overlap
        );
        overlap
    }
}

/// Welch estimate of `Sxx`, `Syy`, `Sxy` and `Syx` for pressure `x` and flow `y`.
pub fn estimate(
    x: &TimeSeries,
    y: &TimeSeries,
    cfg: &WelchConfig,
) -> Result<SpectralEstimate, AnalysisError> {
    check_pair(x, y)?;
    let plan = SegmentPlan::new(x.len(), x.fs, cfg)?;
    debug!(
        "welch: segment={} shift={} segments={} window={:?} detrend={:?}",
        plan.segment_length, plan.shift, plan.n_segments, cfg.window, cfg.detrend
    );
    let ts = x.sampling_period();
    let n = plan.segment_length;
    let window = cfg.window.build(n);
    let norm_window_sq: f64 = window.iter().map(|w| w * w).sum();
    let scale = ts / norm_window_sq;

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut sxx = vec![0.0; n];
    let mut syy = vec![0.0; n];
    let mut sxy = vec![Complex64::new(0.0, 0.0); n];
    let mut syx = vec![Complex64::new(0.0, 0.0); n];

    for seg in 0..plan.n_segments {
        let start = seg * plan.shift;
        let range = start..start + n;
        let dft_x = segment_dft(&x.data[range.clone()], &window, cfg.detrend, &*r2c)?;
        let dft_y = segment_dft(&y.data[range], &window, cfg.detrend, &*r2c)?;
        for k in 0..n {
            sxx[k] += (dft_x[k].conj() * dft_x[k]).re * scale;
            syy[k] += (dft_y[k].conj() * dft_y[k]).re * scale;
            sxy[k] += dft_x[k].conj() * dft_y[k] * scale;
            syx[k] += dft_y[k].conj() * dft_x[k] * scale;
        }
    }

    let count = plan.n_segments as f64;
    sxx.iter_mut().for_each(|v| *v /= count);
    syy.iter_mut().for_each(|v| *v /= count);
    sxy.iter_mut().for_each(|v| *v /= count);
    syx.iter_mut().for_each(|v| *v /= count);

    let df = x.fs / n as f64;
    Ok(SpectralEstimate {
        freq: (0..n).map(|k| k as f64 * df).collect(),
        sxx,
        syy,
        sxy,
        syx,
        n_segments: plan.n_segments,
        ts,
        unit_x: None,
        unit_y: None,
    })
}

/// Full two-sided DFT of one detrended, windowed segment.
fn segment_dft(
    segment: &[f64],
    window: &[f64],
    detrend: Detrend,
    r2c: &dyn realfft::RealToComplex<f64>,
) -> Result<Vec<Complex64>, AnalysisError> {
    let n = segment.len();
    let mut frame: Vec<f64> = detrend
        .apply(segment)
        .iter()
        .zip(window)
        .map(|(x, w)| x * w)
        .collect();
    let mut half = r2c.make_output_vec();
    r2c.process(&mut frame, &mut half)?;
    Ok(expand_hermitian(&half, n))
}

/// Rebuilds all `n` bins of a real signal's DFT from its first `n/2 + 1` bins.
pub(crate) fn expand_hermitian(half: &[Complex64], n: usize) -> Vec<Complex64> {
    (0..n)
        .map(|k| if k < half.len() { half[k] } else { half[n - k].conj() })
        .collect()
}
