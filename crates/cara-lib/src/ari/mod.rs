//! Autoregulation index: step response reconstruction and reference-model fit.

pub mod fit;
pub mod models;
pub mod reconstruction;

pub use fit::{fit_ari, reference_response, upsample, FitConfig, ModelFit};
pub use models::{ReferenceModel, REFERENCE_MODELS};
pub use reconstruction::{
    assess_validity, condition_spectrum, reconstruct, ReconstructionConfig, StepReconstruction,
    StepValidity,
};

use crate::error::AnalysisError;
use crate::tfa::TransferFunctionEstimate;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AriConfig {
    pub reconstruction: ReconstructionConfig,
    pub fit: FitConfig,
}

/// Step response of one case and, when it is assessable, its best model fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoregulationFit {
    pub time_vals: Vec<f64>,
    pub step_response: Vec<f64>,
    pub validity: StepValidity,
    /// `None` when the step response could not be assessed.
    pub fit: Option<ModelFit>,
}

impl AutoregulationFit {
    pub fn ari_int(&self) -> Option<u8> {
        self.fit.as_ref().map(|f| f.ari_int)
    }

    pub fn ari_frac(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.ari_frac)
    }

    pub fn best_fit_curve(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.best_fit_curve.as_slice())
    }
}

/// Reconstructs the step response of `tf` and fits it when it is valid.
pub fn compute_ari(
    tf: &TransferFunctionEstimate,
    cfg: &AriConfig,
) -> Result<AutoregulationFit, AnalysisError> {
    let rec = reconstruct(&tf.h, tf.ts, &cfg.reconstruction)?;
    let fit = if rec.validity.is_valid() {
        let fit = fit_ari(&rec.step_response, tf.ts, &cfg.fit)?;
        info!("ARI {} ({:.2})", fit.ari_int, fit.ari_frac);
        Some(fit)
    } else {
        None
    };
    Ok(AutoregulationFit {
        time_vals: rec.time_vals,
        step_response: rec.step_response,
        validity: rec.validity,
        fit,
    })
}
