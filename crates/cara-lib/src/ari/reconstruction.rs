use crate::error::{AnalysisError, ConfigError};
use log::{debug, warn};
use realfft::num_complex::Complex64;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Calibration of the frequency response to step response conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Content above this frequency is removed before the inverse transform.
    pub high_cutoff_hz: f64,
    /// Width of the half-cosine fade ending at the cutoff, in bins.
    pub high_fade_bins: usize,
    /// Width of the fade-in from DC, in bins. 0 disables it.
    pub low_fade_bins: usize,
    /// Cosine fade applied on each side of the rotated impulse response.
    pub wrap_fade: usize,
    /// Length of the cropped impulse response, in samples.
    pub response_length: usize,
    /// Samples kept before the impulse onset when cropping.
    pub pre_onset: usize,
    /// Fade-out at the end of the cropped impulse response.
    pub tail_fade: usize,
    /// Zero samples prepended to the step response.
    pub pre_stimulus: usize,
    /// `(ABP_control - ABP_critical) / CBFV_control = (120 - 12) / 100`.
    pub step_scale: f64,
    /// Early window of the validity gate, in samples.
    pub early_window: usize,
    /// Add the impulse-response area before the onset to the first step sample.
    pub fold_acausal: bool,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            high_cutoff_hz: 0.5,
            high_fade_bins: 8,
            low_fade_bins: 0,
            wrap_fade: 5,
            response_length: 100,
            pre_onset: 3,
            tail_fade: 10,
            pre_stimulus: 5,
            step_scale: 1.08,
            early_window: 20,
            fold_acausal: true,
        }
    }
}

impl ReconstructionConfig {
    /// Number of samples of the reconstructed step response.
    pub fn n_duration(&self) -> usize {
        self.pre_stimulus + self.response_length - self.pre_onset
    }
}

/// Outcome of the validity gate on a reconstructed step response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepValidity {
    Valid,
    /// Unknown bins in the frequency response reached the time domain.
    NonFinite,
    /// Flow decreases after a pressure increase.
    NegativeMean { half_mean: f64, early_mean: f64 },
}

impl StepValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, StepValidity::Valid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReconstruction {
    pub time_vals: Vec<f64>,
    pub step_response: Vec<f64>,
    pub validity: StepValidity,
}

/// Raised-cosine fade-in weights of width `width`, excluding the end points.
fn fade_in(width: usize) -> impl Iterator<Item = f64> {
    (0..width).map(move |j| 0.5 * (1.0 - (PI * (j + 1) as f64 / (width + 1) as f64).cos()))
}

fn apply_fades(data: &mut [f64], head: usize, tail: usize) {
    let n = data.len();
    for (v, w) in data.iter_mut().zip(fade_in(head.min(n))) {
        *v *= w;
    }
    for (v, w) in data.iter_mut().rev().zip(fade_in(tail.min(n))) {
        *v *= w;
    }
}

/// Band-limits the full `N`-bin response and rebuilds it as a Hermitian spectrum.
pub fn condition_spectrum(
    h: &[Complex64],
    ts: f64,
    cfg: &ReconstructionConfig,
) -> Vec<Complex64> {
    let n = h.len();
    let half = n / 2;
    let df = 1.0 / (n as f64 * ts);
    let cutoff_bin = (cfg.high_cutoff_hz / df).floor() as usize + 1;
    let fade_start = cutoff_bin.saturating_sub(cfg.high_fade_bins);

    let weight = |k: usize| -> f64 {
        let mut w = 1.0;
        if k >= cutoff_bin {
            return 0.0;
        }
        if k >= fade_start {
            let j = cutoff_bin - k;
            w *= 0.5 * (1.0 - (PI * j as f64 / (cfg.high_fade_bins + 1) as f64).cos());
        }
        if k < cfg.low_fade_bins {
            w *= 0.5 * (1.0 - (PI * k as f64 / cfg.low_fade_bins as f64).cos());
        }
        w
    };

    let mut out = vec![Complex64::new(0.0, 0.0); n];
    for k in 0..=half.min(n.saturating_sub(1)) {
        let w = weight(k);
        out[k] = if w == 0.0 {
            Complex64::new(0.0, 0.0)
        } else {
            h[k] * w
        };
    }
    if n > 0 {
        out[0].im = 0.0;
    }
    if n % 2 == 0 && n > 0 {
        out[half] = Complex64::new(0.0, 0.0);
    }
    for k in 1..(n + 1) / 2 {
        out[n - k] = out[k].conj();
    }
    out
}

/// Rebuilds the step response from a frequency response sampled at `k / (N ts)`.
pub fn reconstruct(
    h: &[Complex64],
    ts: f64,
    cfg: &ReconstructionConfig,
) -> Result<StepReconstruction, AnalysisError> {
    let n = h.len();
    if !(ts > 0.0) || !ts.is_finite() {
        return Err(ConfigError::NonPositiveSamplingRate(1.0 / ts).into());
    }
    if cfg.response_length > n || cfg.pre_onset >= cfg.response_length {
        return Err(ConfigError::ResponseTooLong {
            needed: cfg.response_length,
            available: n,
        }
        .into());
    }

    let conditioned = condition_spectrum(h, ts, cfg);
    let mut planner = RealFftPlanner::<f64>::new();
    let c2r = planner.plan_fft_inverse(n);
    let mut spectrum = conditioned[..n / 2 + 1].to_vec();
    let mut impulse = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut impulse)?;

    impulse.rotate_right(n / 2);
    apply_fades(&mut impulse, cfg.wrap_fade, cfg.wrap_fade);
    // the band limit spreads the onset over negative time
    let acausal: f64 = if cfg.fold_acausal {
        impulse[..n / 2].iter().sum()
    } else {
        0.0
    };

    let start = n / 2 + n - cfg.pre_onset;
    let mut cropped: Vec<f64> = (0..cfg.response_length)
        .map(|i| impulse[(start + i) % n])
        .collect();
    apply_fades(&mut cropped, cfg.pre_onset, cfg.tail_fade);
    cropped.rotate_left(cfg.pre_onset);
    cropped.truncate(cfg.response_length - cfg.pre_onset);

    let mut step_response = vec![0.0; cfg.pre_stimulus];
    let mut acc = acausal * ts;
    step_response.extend(cropped.iter().map(|v| {
        acc += v * ts;
        acc * cfg.step_scale
    }));
    let time_vals = (0..step_response.len()).map(|i| i as f64 * ts).collect();
    let validity = assess_validity(&step_response, cfg.early_window);
    debug!(
        "reconstructed {} step samples from {} bins ({:?})",
        step_response.len(),
        n,
        validity
    );

    Ok(StepReconstruction {
        time_vals,
        step_response,
        validity,
    })
}

/// A step response is assessable only if it is finite and rises on average
/// over its first half and its first `early_window` samples.
pub fn assess_validity(step: &[f64], early_window: usize) -> StepValidity {
    if step.iter().any(|v| !v.is_finite()) {
        warn!("step response contains non-finite samples; ARI not assessable");
        return StepValidity::NonFinite;
    }
    let mean = |data: &[f64]| {
        if data.is_empty() {
            0.0
        } else {
            data.iter().sum::<f64>() / data.len() as f64
        }
    };
    let half_mean = mean(&step[..step.len() / 2]);
    let early_mean = mean(&step[..early_window.min(step.len())]);
    if half_mean < 0.0 || early_mean < 0.0 {
        warn!(
            "negative step response (first half mean {half_mean:.4}, early mean {early_mean:.4}); ARI not assessable"
        );
        StepValidity::NegativeMean {
            half_mean,
            early_mean,
        }
    } else {
        StepValidity::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ari::models::{ReferenceModel, REFERENCE_MODELS};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    fn constant_response(n: usize, gain: f64) -> Vec<Complex64> {
        vec![Complex64::new(gain, 0.0); n]
    }

    /// Exact `n`-bin frequency response of a reference model.
    fn model_response(model: &ReferenceModel, n: usize, ts: f64) -> Vec<Complex64> {
        let mut impulse = vec![0.0; 8 * n];
        impulse[0] = 1.0;
        let mut periodic = vec![0.0; n];
        for (i, v) in model.simulate(&impulse, ts, 1e6).into_iter().enumerate() {
            periodic[i % n] += v;
        }
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(n);
        let mut half = r2c.make_output_vec();
        r2c.process(&mut periodic, &mut half).unwrap();
        let mut h = vec![Complex64::new(0.0, 0.0); n];
        h[..half.len()].copy_from_slice(&half);
        for k in 1..n / 2 {
            h[n - k] = half[k].conj();
        }
        h
    }

    #[test]
    fn conditioned_spectrum_is_hermitian() {
        let h: Vec<Complex64> = (0..512)
            .map(|k| Complex64::from_polar(1.0 + 0.01 * k as f64, 0.3 - 0.002 * k as f64))
            .collect();
        let out = condition_spectrum(&h, 0.2, &ReconstructionConfig::default());
        assert_eq!(out[256], Complex64::new(0.0, 0.0));
        assert_eq!(out[0].im, 0.0);
        for k in 1..512 {
            assert_eq!(out[512 - k], out[k].conj(), "bin {k}");
        }
    }

    #[test]
    fn content_above_cutoff_is_zero_even_if_unknown() {
        let mut h = constant_response(512, 1.0);
        for v in h.iter_mut().skip(200) {
            *v = Complex64::new(f64::NAN, f64::NAN);
        }
        let cfg = ReconstructionConfig::default();
        let out = condition_spectrum(&h, 0.2, &cfg);
        // df = 5/512 Hz, so the first bin above 0.5 Hz is 52
        assert_eq!(out[52], Complex64::new(0.0, 0.0));
        assert_eq!(out[255], Complex64::new(0.0, 0.0));
        assert_close(out[40].re, 1.0, 1e-12);
        assert!(out[45].re > out[50].re && out[50].re > 0.0);
        assert!(out.iter().all(|c| c.re.is_finite()));
    }

    #[test]
    fn low_fade_starts_from_zero() {
        let cfg = ReconstructionConfig {
            low_fade_bins: 4,
            ..ReconstructionConfig::default()
        };
        let out = condition_spectrum(&constant_response(512, 1.0), 0.2, &cfg);
        assert_eq!(out[0], Complex64::new(0.0, 0.0));
        assert_close(out[2].re, 0.5, 1e-12);
        assert_close(out[4].re, 1.0, 1e-12);
    }

    #[test]
    fn pure_gain_gives_rising_valid_step() {
        let cfg = ReconstructionConfig::default();
        let rec = reconstruct(&constant_response(512, 0.8), 0.2, &cfg).unwrap();
        assert_eq!(rec.step_response.len(), cfg.n_duration());
        assert_eq!(rec.time_vals.len(), 102);
        assert_close(rec.time_vals[1], 0.2, 1e-12);
        assert!(rec.step_response[..5].iter().all(|v| *v == 0.0));
        assert!(rec.validity.is_valid());
        let last = rec.step_response[101];
        assert!(last > 0.0);
        let mid = rec.step_response[60];
        assert_close(mid / last, 1.0, 0.1);
    }

    #[test]
    fn regulated_model_keeps_its_overshoot() {
        let cfg = ReconstructionConfig::default();
        let h = model_response(&REFERENCE_MODELS[3], 512, 0.2);
        let rec = reconstruct(&h, 0.2, &cfg).unwrap();
        assert!(rec.validity.is_valid());
        let step = &rec.step_response;
        let last = step[101];
        // steady state 1 - K of the model, scaled by N * Ts * step_scale
        assert_close(last / (512.0 * 0.2 * cfg.step_scale), 0.4, 0.02);
        assert!(step[5] > 0.0, "onset {}", step[5]);
        let peak = step[5..35].iter().copied().fold(f64::MIN, f64::max);
        let overshoot = peak / last;
        assert!(overshoot > 2.3 && overshoot < 2.9, "overshoot {overshoot}");
    }

    #[test]
    fn every_reference_model_is_assessable() {
        let cfg = ReconstructionConfig::default();
        for (i, model) in REFERENCE_MODELS.iter().enumerate() {
            let rec = reconstruct(&model_response(model, 512, 0.2), 0.2, &cfg).unwrap();
            assert!(rec.validity.is_valid(), "model {i}: {:?}", rec.validity);
            assert!(rec.step_response[5] > 0.0, "model {i}");
        }
    }

    #[test]
    fn negative_gain_is_not_assessable() {
        let rec = reconstruct(
            &constant_response(512, -0.8),
            0.2,
            &ReconstructionConfig::default(),
        )
        .unwrap();
        assert!(matches!(rec.validity, StepValidity::NegativeMean { .. }));
    }

    #[test]
    fn unknown_low_frequency_bins_are_not_assessable() {
        let mut h = constant_response(512, 1.0);
        h[3] = Complex64::new(f64::NAN, f64::NAN);
        h[509] = h[3];
        let rec = reconstruct(&h, 0.2, &ReconstructionConfig::default()).unwrap();
        assert_eq!(rec.validity, StepValidity::NonFinite);
    }

    #[test]
    fn short_spectrum_is_a_config_error() {
        let err = reconstruct(
            &constant_response(64, 1.0),
            0.2,
            &ReconstructionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Config(ConfigError::ResponseTooLong {
                needed: 100,
                available: 64
            })
        ));
    }

    #[test]
    fn negative_early_mean_is_rejected() {
        let mut step = vec![0.0; 102];
        for (i, v) in step.iter_mut().enumerate().skip(5) {
            *v = if i < 20 { -1.0 } else { 0.5 };
        }
        match assess_validity(&step, 20) {
            StepValidity::NegativeMean { early_mean, .. } => assert!(early_mean < 0.0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(assess_validity(&[0.0, 1.0, 1.0, 1.0], 20), StepValidity::Valid);
    }
}
