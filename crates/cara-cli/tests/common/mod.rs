#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const FS: f64 = 5.0;
pub const SAMPLES: usize = 3000;

/// Random pressure around 80 mmHg.
pub fn pressure(seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..SAMPLES).map(|_| 80.0 + rng.gen_range(-5.0..5.0)).collect()
}

/// Flow that follows pressure through a lag and partially compensates for it.
pub fn flow(pressure: &[f64], compensation: f64) -> Vec<f64> {
    let dt = 1.0 / FS;
    let (mut lagged, mut slow) = (pressure[0], pressure[0]);
    pressure
        .iter()
        .map(|&p| {
            lagged += dt / 0.5 * (p - lagged);
            slow += dt / 2.0 * (lagged - slow);
            0.6 * (lagged - compensation * slow)
        })
        .collect()
}

/// `time,ABP,CBFV_L,CBFV_R` recording at 5 Hz.
pub fn write_recording(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let p = pressure(7);
    let left = flow(&p, 0.7);
    let right = flow(&p, 0.2);
    let mut text = String::from("time,ABP,CBFV_L,CBFV_R\n");
    for i in 0..SAMPLES {
        writeln!(text, "{},{},{},{}", i as f64 / FS, p[i], left[i], right[i])?;
    }
    let path = dir.join("recording.csv");
    std::fs::write(&path, text)?;
    Ok(path)
}

pub fn write_column(dir: &Path, name: &str, values: &[f64]) -> Result<PathBuf, Box<dyn Error>> {
    let mut text = String::new();
    for v in values {
        writeln!(text, "{v}")?;
    }
    let path = dir.join(name);
    std::fs::write(&path, text)?;
    Ok(path)
}
