use thiserror::Error;

/// Invalid analysis parameters, detected before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sampling frequency must be positive, got {0} Hz")]
    NonPositiveSamplingRate(f64),
    #[error("pressure and flow sampling rates differ ({pressure} Hz vs {flow} Hz)")]
    RateMismatch { pressure: f64, flow: f64 },
    #[error("pressure and flow lengths differ ({pressure} vs {flow} samples)")]
    LengthMismatch { pressure: usize, flow: usize },
    #[error("overlap must lie in [0, 1), got {0}")]
    InvalidOverlap(f64),
    #[error("segment length must be positive, got {0} s")]
    NonPositiveSegment(f64),
    #[error("segment of {segment} samples does not fit in a signal of {signal} samples")]
    SegmentTooLong { segment: usize, signal: usize },
    #[error("overlap {overlap} leaves no shift between segments of {segment} samples")]
    NoSegmentShift { overlap: f64, segment: usize },
    #[error("unknown window type '{0}' (expected rectangular, hann, hamming or tukey)")]
    UnknownWindow(String),
    #[error("unknown detrend mode '{0}' (expected none, constant or linear)")]
    UnknownDetrend(String),
    #[error("unknown smoothing kernel '{0}' (expected rectangular or triangular)")]
    UnknownKernel(String),
    #[error("unknown estimator '{0}' (expected H1 or H2)")]
    UnknownEstimator(String),
    #[error("unknown significance level '{0}' (expected 1%, 5% or 10%)")]
    UnknownSignificance(String),
    #[error("unknown frequency band '{0}' (expected VLF, LF, HF, ALL or FULL)")]
    UnknownBand(String),
    #[error("smoothing kernel needs at least one tap")]
    NoTaps,
    #[error("response window of {needed} samples does not fit in a spectrum of {available} bins")]
    ResponseTooLong { needed: usize, available: usize },
    #[error("step response of {0} samples is too short to fit")]
    StepTooShort(usize),
    #[error("upsampling expansion factor must be at least 1")]
    ZeroExpansion,
    #[error("no reference model with ARI {0} (expected 0..=9)")]
    UnknownModel(usize),
}

/// Failure of a whole analysis step.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("FFT backend failed: {0}")]
    Fft(String),
}

impl From<realfft::FftError> for AnalysisError {
    fn from(err: realfft::FftError) -> Self {
        AnalysisError::Fft(err.to_string())
    }
}
