pub mod csv;
pub mod text;

pub use self::csv::{read_recording_csv, Recording};
pub use self::text::{parse_f64_series, read_f64_series, read_series};
