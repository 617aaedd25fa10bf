//! One-case orchestration: spectra, transfer function and ARI for a pressure/flow pair.

use crate::ari::{compute_ari, AriConfig, AutoregulationFit, StepValidity};
use crate::error::AnalysisError;
use crate::signal::{Side, TimeSeries};
use crate::spectral::{estimate, smooth, SmoothingConfig, SpectralEstimate, WelchConfig};
use crate::tfa::{transfer_function, BandSummary, Estimator, SignificanceLevel, TransferFunctionEstimate};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread;

/// Full analysis configuration; every field falls back to the clinical defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub welch: WelchConfig,
    /// Smooth the spectra along frequency before the transfer function.
    pub smooth_spectra: bool,
    pub smoothing: SmoothingConfig,
    pub estimator: Estimator,
    pub significance: SignificanceLevel,
    pub ari: AriConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            welch: WelchConfig::default(),
            smooth_spectra: true,
            smoothing: SmoothingConfig::default(),
            estimator: Estimator::H1,
            significance: SignificanceLevel::FivePercent,
            ari: AriConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing analysis configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
    }
}

/// Optional unit labels of the two signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Units {
    pub pressure: Option<String>,
    pub flow: Option<String>,
}

/// Every stage output of one pressure/flow case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub side: Option<Side>,
    pub spectrum: SpectralEstimate,
    pub transfer: TransferFunctionEstimate,
    pub bands: Vec<BandSummary>,
    pub ari: AutoregulationFit,
}

impl CaseReport {
    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            side: self.side,
            n_segments: self.transfer.n_segments,
            estimator: self.transfer.estimator,
            unit: self.transfer.unit.clone(),
            bands: self.bands.clone(),
            validity: self.ari.validity,
            ari_int: self.ari.ari_int(),
            ari_frac: self.ari.ari_frac(),
        }
    }
}

/// Report of one case without the spectra and curves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub side: Option<Side>,
    pub n_segments: usize,
    pub estimator: Estimator,
    pub unit: String,
    pub bands: Vec<BandSummary>,
    pub validity: StepValidity,
    pub ari_int: Option<u8>,
    pub ari_frac: Option<f64>,
}

/// Spectra of the pair, smoothed when configured.
pub fn spectra(
    pressure: &TimeSeries,
    flow: &TimeSeries,
    units: &Units,
    cfg: &AnalysisConfig,
) -> Result<SpectralEstimate, AnalysisError> {
    let spectrum = estimate(pressure, flow, &cfg.welch)?
        .with_units(units.pressure.clone(), units.flow.clone());
    if cfg.smooth_spectra {
        Ok(smooth(&spectrum, &cfg.smoothing)?)
    } else {
        Ok(spectrum)
    }
}

pub fn analyze_case(
    pressure: &TimeSeries,
    flow: &TimeSeries,
    side: Option<Side>,
    units: &Units,
    cfg: &AnalysisConfig,
) -> Result<CaseReport, AnalysisError> {
    let spectrum = spectra(pressure, flow, units, cfg)?;
    let transfer = transfer_function(&spectrum, cfg.estimator, cfg.significance);
    let bands = transfer.band_summary();
    let ari = compute_ari(&transfer, &cfg.ari)?;
    if let Some(side) = side {
        debug!("side {side}: ARI {:?}", ari.ari_frac());
    }
    Ok(CaseReport {
        side,
        spectrum,
        transfer,
        bands,
        ari,
    })
}

/// Left and right cases share the pressure channel and run on separate threads.
pub fn analyze_sides(
    pressure: &TimeSeries,
    left: &TimeSeries,
    right: &TimeSeries,
    units: &Units,
    cfg: &AnalysisConfig,
) -> Result<(CaseReport, CaseReport), AnalysisError> {
    let (left, right) = thread::scope(|scope| {
        let left = scope.spawn(|| analyze_case(pressure, left, Some(Side::Left), units, cfg));
        let right = analyze_case(pressure, right, Some(Side::Right), units, cfg);
        let left = match left.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (left, right)
    });
    Ok((left?, right?))
}
