pub mod smoothing;
pub mod welch;
pub mod window;

pub use smoothing::{smooth, SmoothingConfig, SmoothingKernel};
pub use welch::{adjust_overlap, estimate, SegmentPlan, SpectralEstimate, WelchConfig};
pub use window::{Detrend, WindowType};
