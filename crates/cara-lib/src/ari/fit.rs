use super::models::{exponential_smooth, REFERENCE_MODELS};
use crate::error::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};

/// Parameters of the reference-model regression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Zero samples of the pressure excitation before the step.
    pub pre_stimulus: usize,
    /// Upsampling factor used for short responses.
    pub expansion_factor: usize,
    /// Responses shorter than this (in seconds) are upsampled.
    pub upsample_below_s: f64,
    /// Early window (at the analysis rate) holding the patient's peak.
    pub peak_window: usize,
    /// Time constant of the single-pole smoothing of model responses, in seconds.
    pub smoothing_time_constant_s: f64,
    /// Model states beyond this magnitude are reset to zero.
    pub divergence_limit: f64,
    /// Floor for near-zero denominators and errors.
    pub floor: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            pre_stimulus: 5,
            expansion_factor: 4,
            upsample_below_s: 30.0,
            peak_window: 30,
            smoothing_time_constant_s: 0.2,
            divergence_limit: 1e6,
            floor: 1e-6,
        }
    }
}

impl FitConfig {
    /// Expansion actually used for a response of `n_duration` samples.
    pub fn expansion_for(&self, n_duration: usize, ts: f64) -> usize {
        if (n_duration as f64) * ts < self.upsample_below_s {
            self.expansion_factor
        } else {
            1
        }
    }
}

/// Best reference model for one step response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    pub ari_int: u8,
    pub ari_frac: f64,
    /// Rescaled winning model at the analysis rate.
    pub best_fit_curve: Vec<f64>,
    /// Normalised RMS error of each reference model, by ARI.
    pub per_candidate_error: [f64; 10],
    pub goodness: [f64; 10],
    pub expansion_factor: usize,
}

/// Linear interpolation by an integer factor: `(len - 1) * factor + 1` samples.
pub fn upsample(data: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 || data.len() < 2 {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity((data.len() - 1) * factor + 1);
    for pair in data.windows(2) {
        let delta = pair[1] - pair[0];
        out.extend((0..factor).map(|j| pair[0] + delta * j as f64 / factor as f64));
    }
    out.extend(data.last().copied());
    out
}

/// Smoothed responses of all reference models to the pressure step, at the
/// upsampled rate and truncated to the evaluation length.
fn model_responses(n_duration: usize, ts: f64, expansion: usize, cfg: &FitConfig) -> Vec<Vec<f64>> {
    let excitation: Vec<f64> = (0..2 * n_duration)
        .map(|i| if i < cfg.pre_stimulus { 0.0 } else { 1.0 })
        .collect();
    let excitation = upsample(&excitation, expansion);
    let dt = ts / expansion as f64;
    let keep = (n_duration - 1) * expansion + 1;
    REFERENCE_MODELS
        .iter()
        .map(|model| {
            let raw = model.simulate(&excitation, dt, cfg.divergence_limit);
            let mut smoothed = exponential_smooth(&raw, dt, cfg.smoothing_time_constant_s);
            smoothed.truncate(keep);
            smoothed
        })
        .collect()
}

/// Response of reference model `index` sampled like a patient step response.
pub fn reference_response(
    index: usize,
    n_duration: usize,
    ts: f64,
    cfg: &FitConfig,
) -> Result<Vec<f64>, ConfigError> {
    if cfg.expansion_factor == 0 {
        return Err(ConfigError::ZeroExpansion);
    }
    if n_duration < 2 {
        return Err(ConfigError::StepTooShort(n_duration));
    }
    if index >= REFERENCE_MODELS.len() {
        return Err(ConfigError::UnknownModel(index));
    }
    let expansion = cfg.expansion_for(n_duration, ts);
    let responses = model_responses(n_duration, ts, expansion, cfg);
    Ok(responses[index]
        .iter()
        .step_by(expansion)
        .copied()
        .collect())
}

fn max_of(data: &[f64]) -> f64 {
    data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn floored(value: f64, floor: f64) -> f64 {
    if value.abs() < floor {
        floor
    } else {
        value
    }
}

/// Regresses `step` (sampled every `ts` seconds) against the reference models.
pub fn fit_ari(step: &[f64], ts: f64, cfg: &FitConfig) -> Result<ModelFit, ConfigError> {
    if cfg.expansion_factor == 0 {
        return Err(ConfigError::ZeroExpansion);
    }
    let n_duration = step.len();
    if n_duration < cfg.peak_window.max(2) || cfg.peak_window == 0 {
        return Err(ConfigError::StepTooShort(n_duration));
    }
    let expansion = cfg.expansion_for(n_duration, ts);
    debug!("fitting {n_duration} samples with expansion factor {expansion}");

    let patient = upsample(step, expansion);
    let window = (cfg.peak_window - 1) * expansion + 1;
    let p0 = patient[0];
    let p_peak = max_of(&patient[..window]);
    let norm = p_peak.abs().max(cfg.floor);

    let mut per_candidate_error = [0.0; 10];
    let mut goodness = [0.0; 10];
    let mut rescaled_models = Vec::with_capacity(REFERENCE_MODELS.len());
    for (i, model) in model_responses(n_duration, ts, expansion, cfg)
        .into_iter()
        .enumerate()
    {
        let m0 = model[0];
        let m_peak = max_of(&model[..window]);
        let slope = (p_peak - p0) / floored(m_peak - m0, cfg.floor);
        let offset = p0 - slope * m0;
        let rescaled: Vec<f64> = model.iter().map(|m| slope * m + offset).collect();
        let mse = patient
            .iter()
            .zip(&rescaled)
            .map(|(p, m)| (p - m) * (p - m))
            .sum::<f64>()
            / patient.len() as f64;
        let error = (mse.sqrt() / norm).max(cfg.floor);
        per_candidate_error[i] = error;
        goodness[i] = 1.0 / error;
        rescaled_models.push(rescaled);
    }
    debug!("per-candidate errors {per_candidate_error:?}");

    let best = goodness
        .iter()
        .enumerate()
        .fold(0, |best, (i, g)| if *g > goodness[best] { i } else { best });
    let ari_frac = refine(&goodness, best);
    let best_fit_curve = rescaled_models[best]
        .iter()
        .step_by(expansion)
        .copied()
        .collect();

    Ok(ModelFit {
        ari_int: best as u8,
        ari_frac,
        best_fit_curve,
        per_candidate_error,
        goodness,
        expansion_factor: expansion,
    })
}

/// Vertex of the parabola through the best index and its neighbours.
fn refine(goodness: &[f64; 10], best: usize) -> f64 {
    let c = best.clamp(1, 8);
    let (g0, g1, g2) = (goodness[c - 1], goodness[c], goodness[c + 1]);
    let curvature = g0 - 2.0 * g1 + g2;
    if curvature < 0.0 {
        let x = c as f64 - (g2 - g0) / (2.0 * curvature);
        x.clamp(0.0, 9.0)
    } else {
        best as f64
    }
}
