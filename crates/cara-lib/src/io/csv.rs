use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use log::debug;
use std::path::Path;

use crate::signal::TimeSeries;

/// Columns of a multi-channel recording sharing one sampling rate.
#[derive(Debug, Clone)]
pub struct Recording {
    pub fs: f64,
    pub channels: Vec<(String, Vec<f64>)>,
}

impl Recording {
    pub fn series(&self, name: &str) -> Result<TimeSeries> {
        self.channels
            .iter()
            .find(|(channel, _)| channel.eq_ignore_ascii_case(name))
            .map(|(_, data)| TimeSeries::new(self.fs, data.clone()))
            .ok_or_else(|| anyhow!("recording has no channel '{name}'"))
    }
}

/// Load the requested `columns` of a CSV recording with a header row.
///
/// The sampling rate comes from `time_col` (seconds, `1 / mean(diff(t))`) when
/// given, otherwise from `fs`.
pub fn read_recording_csv(
    path: &Path,
    columns: &[&str],
    time_col: Option<&str>,
    fs: Option<f64>,
    delimiter: u8,
) -> Result<Recording> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .with_context(|| format!("missing column '{}' in {}", name, path.display()))
    };
    let indices = columns.iter().map(|&c| find(c)).collect::<Result<Vec<_>>>()?;
    let time_idx = time_col.map(find).transpose()?;

    let mut data: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    let mut times = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading record {}", row + 1))?;
        let field = |idx: usize| -> Result<f64> {
            let raw = record
                .get(idx)
                .ok_or_else(|| anyhow!("record {} is missing column {}", row + 1, idx + 1))?;
            raw.parse::<f64>()
                .with_context(|| format!("record {}: '{}' is not a number", row + 1, raw))
        };
        for (values, &idx) in data.iter_mut().zip(&indices) {
            values.push(field(idx)?);
        }
        if let Some(idx) = time_idx {
            times.push(field(idx)?);
        }
    }

    let fs = match (time_idx, fs) {
        (Some(_), _) => rate_from_times(&times)?,
        (None, Some(fs)) if fs > 0.0 => fs,
        (None, Some(fs)) => bail!("sampling rate must be positive, got {fs}"),
        (None, None) => bail!("no time column and no sampling rate given"),
    };
    debug!(
        "read {} samples of {} channel(s) at {fs} Hz from {}",
        times.len().max(data.first().map_or(0, Vec::len)),
        columns.len(),
        path.display()
    );
    Ok(Recording {
        fs,
        channels: columns
            .iter()
            .map(|c| c.to_string())
            .zip(data)
            .collect(),
    })
}

fn rate_from_times(times: &[f64]) -> Result<f64> {
    if times.len() < 2 {
        bail!("need at least two time stamps to derive the sampling rate");
    }
    let mean_step = (times[times.len() - 1] - times[0]) / (times.len() - 1) as f64;
    if !(mean_step > 0.0) {
        bail!("time column is not increasing");
    }
    Ok(1.0 / mean_step)
}
