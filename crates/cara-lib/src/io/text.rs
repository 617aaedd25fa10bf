use anyhow::{Context, Result};
use std::path::Path;

use crate::signal::TimeSeries;

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not a number: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text).with_context(|| format!("in {}", path.display()))
}

/// Single-column recording sampled at `fs` Hz.
pub fn read_series(path: &Path, fs: f64) -> Result<TimeSeries> {
    if !(fs > 0.0) {
        anyhow::bail!("sampling rate must be positive, got {fs}");
    }
    Ok(TimeSeries::new(fs, read_f64_series(path)?))
}
