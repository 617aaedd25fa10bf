pub mod ari;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod spectral;
pub mod tfa;

mod serde_complex;

pub use ari::*;
pub use error::*;
pub use pipeline::*;
pub use signal::*;
pub use spectral::*;
pub use tfa::*;
