//! Transfer function analysis: frequency response, coherence and band statistics.

pub mod bands;
pub mod significance;

pub use bands::{band_statistics, Band, BandStatistics};
pub use significance::{critical_coherence, CriticalCoherence, SignificanceLevel};

use crate::error::ConfigError;
use crate::serde_complex;
use crate::spectral::SpectralEstimate;
use log::{debug, warn};
use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Negative phase below this frequency is treated as an artefact.
pub const NEGATIVE_PHASE_CUTOFF_HZ: f64 = 0.1;

/// Which side of the system is assumed to carry the measurement noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Estimator {
    /// `Sxy / Sxx`, noise on the pressure side.
    H1,
    /// `Syy / Syx`, noise on the flow side.
    H2,
}

impl Default for Estimator {
    fn default() -> Self {
        Estimator::H1
    }
}

impl FromStr for Estimator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "H1" => Ok(Estimator::H1),
            "H2" => Ok(Estimator::H2),
            _ => Err(ConfigError::UnknownEstimator(s.to_string())),
        }
    }
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimator::H1 => f.write_str("H1"),
            Estimator::H2 => f.write_str("H2"),
        }
    }
}

/// Values that can be flagged "unknown" by the coherence mask.
pub trait Maskable: Copy {
    fn unknown() -> Self;
}

impl Maskable for f64 {
    fn unknown() -> Self {
        f64::NAN
    }
}

impl Maskable for Complex64 {
    fn unknown() -> Self {
        Complex64::new(f64::NAN, f64::NAN)
    }
}

/// Frequency response of flow to pressure with its coherence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFunctionEstimate {
    pub freq: Vec<f64>,
    #[serde(with = "serde_complex")]
    pub h: Vec<Complex64>,
    pub coherence: Vec<f64>,
    pub estimator: Estimator,
    pub n_segments: usize,
    pub ts: f64,
    pub significance: SignificanceLevel,
    /// `(flow)/(pressure)` when both units are known.
    pub unit: String,
}

/// Estimates the frequency response from averaged spectra.
pub fn transfer_function(
    spectrum: &SpectralEstimate,
    estimator: Estimator,
    significance: SignificanceLevel,
) -> TransferFunctionEstimate {
    let h = match estimator {
        Estimator::H1 => spectrum
            .sxy
            .iter()
            .zip(&spectrum.sxx)
            .map(|(sxy, sxx)| divide(*sxy, Complex64::new(*sxx, 0.0)))
            .collect(),
        Estimator::H2 => spectrum
            .syy
            .iter()
            .zip(&spectrum.syx)
            .map(|(syy, syx)| divide(Complex64::new(*syy, 0.0), *syx))
            .collect(),
    };
    let coherence = spectrum
        .sxy
        .iter()
        .zip(spectrum.sxx.iter().zip(&spectrum.syy))
        .map(|(sxy, (sxx, syy))| {
            let den = sxx * syy;
            if den == 0.0 {
                f64::NAN
            } else {
                sxy.norm_sqr() / den
            }
        })
        .collect();

    match critical_coherence(significance, spectrum.n_segments) {
        CriticalCoherence::Unbounded => warn!(
            "{} segments exceed the coherence tables; no significance threshold applied",
            spectrum.n_segments
        ),
        CriticalCoherence::MaskAll => warn!(
            "only {} segment(s) averaged; coherence is not interpretable and every bin is masked",
            spectrum.n_segments
        ),
        CriticalCoherence::Value(c) => debug!(
            "critical coherence {c} at {significance} for {} segments",
            spectrum.n_segments
        ),
    }

    TransferFunctionEstimate {
        freq: spectrum.freq.clone(),
        h,
        coherence,
        estimator,
        n_segments: spectrum.n_segments,
        ts: spectrum.ts,
        significance,
        unit: transfer_unit(spectrum.unit_x.as_deref(), spectrum.unit_y.as_deref()),
    }
}

fn divide(num: Complex64, den: Complex64) -> Complex64 {
    if den.norm_sqr() == 0.0 {
        Complex64::new(f64::NAN, f64::NAN)
    } else {
        num / den
    }
}

fn transfer_unit(pressure: Option<&str>, flow: Option<&str>) -> String {
    match (pressure, flow) {
        (Some(p), Some(f)) => format!("({f})/({p})"),
        _ => "unspecified unit".to_string(),
    }
}

impl TransferFunctionEstimate {
    pub fn critical_coherence(&self) -> CriticalCoherence {
        critical_coherence(self.significance, self.n_segments)
    }

    /// Copy of `values` with every bin below the critical coherence flagged unknown.
    pub fn apply_threshold<T: Maskable>(&self, values: &[T]) -> Vec<T> {
        let critical = self.critical_coherence();
        values
            .iter()
            .zip(&self.coherence)
            .map(|(v, c)| if critical.passes(*c) { *v } else { T::unknown() })
            .collect()
    }

    pub fn gain(&self, threshold: bool) -> Vec<f64> {
        let gain: Vec<f64> = self.h.iter().map(|h| h.norm()).collect();
        if threshold {
            self.apply_threshold(&gain)
        } else {
            gain
        }
    }

    /// Phase in radians. Negative phase below 0.1 Hz is optionally flagged unknown.
    pub fn phase(&self, threshold: bool, remove_negative: bool) -> Vec<f64> {
        let mut phase: Vec<f64> = self.h.iter().map(|h| h.arg()).collect();
        if threshold {
            phase = self.apply_threshold(&phase);
        }
        if remove_negative {
            for (p, f) in phase.iter_mut().zip(&self.freq) {
                if *f < NEGATIVE_PHASE_CUTOFF_HZ && *p < 0.0 {
                    *p = f64::NAN;
                }
            }
        }
        phase
    }

    pub fn coherence(&self, threshold: bool) -> Vec<f64> {
        if threshold {
            self.apply_threshold(&self.coherence)
        } else {
            self.coherence.clone()
        }
    }

    pub fn statistics(&self, values: &[f64], band: Band) -> Option<BandStatistics> {
        band_statistics(&self.freq, values, band)
    }

    /// Thresholded gain and phase plus raw coherence for VLF, LF and HF.
    pub fn band_summary(&self) -> Vec<BandSummary> {
        let gain = self.gain(true);
        let phase = self.phase(true, true);
        Band::REPORTED
            .iter()
            .map(|&band| {
                let phase_rad = self.statistics(&phase, band);
                BandSummary {
                    band,
                    gain: self.statistics(&gain, band),
                    phase_rad,
                    phase_deg: phase_rad.map(|s| s.scaled(180.0 / PI)),
                    coherence: self.statistics(&self.coherence, band),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandSummary {
    pub band: Band,
    pub gain: Option<BandStatistics>,
    pub phase_rad: Option<BandStatistics>,
    pub phase_deg: Option<BandStatistics>,
    pub coherence: Option<BandStatistics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::TimeSeries;
    use crate::spectral::{estimate, Detrend, WelchConfig, WindowType};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn welch() -> WelchConfig {
        WelchConfig {
            overlap: 0.5,
            segment_length_s: 51.2,
            window: WindowType::Hann,
            detrend: Detrend::Constant,
            adjust_overlap: false,
        }
    }

    fn spectrum_of(x: Vec<f64>, y: Vec<f64>) -> SpectralEstimate {
        estimate(&TimeSeries::new(5.0, x), &TimeSeries::new(5.0, y), &welch()).unwrap()
    }

    #[test]
    fn pure_gain_is_recovered_with_unit_coherence() {
        let x = noise(4096, 3);
        let y: Vec<f64> = x.iter().map(|v| 0.8 * v).collect();
        let spectrum = spectrum_of(x, y);
        for estimator in [Estimator::H1, Estimator::H2] {
            let tf = transfer_function(&spectrum, estimator, SignificanceLevel::FivePercent);
            for k in 1..tf.freq.len() {
                assert_close(tf.h[k].re, 0.8, 1e-9);
                assert_close(tf.h[k].im, 0.0, 1e-9);
                assert_close(tf.coherence[k], 1.0, 1e-9);
            }
        }
    }

    #[test]
    fn fir_response_is_recovered() {
        let x = noise(6000, 11);
        let y: Vec<f64> = (0..x.len())
            .map(|n| 0.5 * x[n] + if n > 0 { 0.3 * x[n - 1] } else { 0.0 })
            .collect();
        let spectrum = spectrum_of(x, y);
        let tf = transfer_function(&spectrum, Estimator::H1, SignificanceLevel::FivePercent);
        let ts = tf.ts;
        for k in Band::All.indices(&tf.freq) {
            let w = 2.0 * PI * tf.freq[k] * ts;
            let expected = Complex64::new(0.5, 0.0) + Complex64::from_polar(0.3, -w);
            let err = (tf.h[k] - expected).norm() / expected.norm();
            assert!(err < 0.05, "bin {k}: {} vs {}", tf.h[k], expected);
            assert!(tf.coherence[k] > 0.95, "bin {k}: coherence {}", tf.coherence[k]);
        }
    }

    #[test]
    fn coherence_is_bounded() {
        let x = noise(4096, 5);
        let y = noise(4096, 6);
        let tf = transfer_function(&spectrum_of(x, y), Estimator::H2, SignificanceLevel::OnePercent);
        for c in &tf.coherence {
            assert!(*c >= 0.0 && *c <= 1.0 + 1e-9, "coherence {c}");
        }
    }

    #[test]
    fn zero_input_power_gives_unknown_bins() {
        let spectrum = SpectralEstimate {
            freq: vec![0.0, 0.1, 0.2],
            sxx: vec![0.0, 1.0, 2.0],
            syy: vec![1.0, 1.0, 0.0],
            sxy: vec![Complex64::new(1.0, 0.0); 3],
            syx: vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
            n_segments: 4,
            ts: 0.2,
            unit_x: None,
            unit_y: None,
        };
        let h1 = transfer_function(&spectrum, Estimator::H1, SignificanceLevel::FivePercent);
        assert!(h1.h[0].re.is_nan());
        assert_close(h1.h[2].re, 0.5, 1e-12);
        assert!(h1.coherence[0].is_nan());
        assert!(h1.coherence[2].is_nan());
        let h2 = transfer_function(&spectrum, Estimator::H2, SignificanceLevel::FivePercent);
        assert!(h2.h[1].re.is_nan());
        assert_eq!(h2.unit, "unspecified unit");
    }

    #[test]
    fn thresholding_is_idempotent() {
        let tf = TransferFunctionEstimate {
            freq: vec![0.0, 0.05, 0.1, 0.15],
            h: vec![Complex64::new(1.0, -1.0); 4],
            coherence: vec![0.9, 0.1, f64::NAN, 0.5],
            estimator: Estimator::H1,
            n_segments: 5,
            ts: 0.2,
            significance: SignificanceLevel::FivePercent,
            unit: "unspecified unit".into(),
        };
        let once = tf.apply_threshold(&tf.gain(false));
        let twice = tf.apply_threshold(&once);
        for (a, b) in once.iter().zip(&twice) {
            assert!(a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()));
        }
        assert!(!once[0].is_nan());
        assert!(once[1].is_nan());
        assert!(once[2].is_nan());
        assert!(!once[3].is_nan());
        let masked_h = tf.apply_threshold(&tf.h);
        assert!(masked_h[1].re.is_nan() && masked_h[1].im.is_nan());
    }

    #[test]
    fn too_few_segments_mask_everything() {
        let tf = TransferFunctionEstimate {
            freq: vec![0.0, 0.1],
            h: vec![Complex64::new(1.0, 0.0); 2],
            coherence: vec![1.0, 1.0],
            estimator: Estimator::H1,
            n_segments: 2,
            ts: 0.2,
            significance: SignificanceLevel::TenPercent,
            unit: "unspecified unit".into(),
        };
        assert!(tf.gain(true).iter().all(|g| g.is_nan()));
        assert!(tf.gain(false).iter().all(|g| *g == 1.0));
    }

    #[test]
    fn negative_low_frequency_phase_is_removed() {
        let tf = TransferFunctionEstimate {
            freq: vec![0.05, 0.08, 0.15],
            h: vec![
                Complex64::new(1.0, -0.5),
                Complex64::new(1.0, 0.5),
                Complex64::new(1.0, -0.5),
            ],
            coherence: vec![1.0; 3],
            estimator: Estimator::H1,
            n_segments: 20,
            ts: 0.2,
            significance: SignificanceLevel::FivePercent,
            unit: "(cm/s)/(mmHg)".into(),
        };
        let phase = tf.phase(false, true);
        assert!(phase[0].is_nan());
        assert!(phase[1] > 0.0);
        assert!(phase[2] < 0.0);
        assert!(tf.phase(false, false)[0] < 0.0);
    }

    #[test]
    fn band_summary_reports_degrees() {
        let freq: Vec<f64> = (0..100).map(|k| k as f64 * 0.01).collect();
        let tf = TransferFunctionEstimate {
            h: vec![Complex64::from_polar(2.0, PI / 4.0); freq.len()],
            coherence: vec![0.9; freq.len()],
            freq,
            estimator: Estimator::H1,
            n_segments: 8,
            ts: 0.2,
            significance: SignificanceLevel::FivePercent,
            unit: "unspecified unit".into(),
        };
        let summary = tf.band_summary();
        assert_eq!(summary.len(), 3);
        let lf = &summary[1];
        assert_eq!(lf.band, Band::Lf);
        assert_close(lf.gain.unwrap().mean, 2.0, 1e-12);
        assert_close(lf.phase_deg.unwrap().mean, 45.0, 1e-9);
        assert_close(lf.coherence.unwrap().max, 0.9, 1e-12);
    }
}
