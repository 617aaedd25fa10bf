use crate::error::ConfigError;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const VLF_HZ: (f64, f64) = (0.02, 0.07);
pub const LF_HZ: (f64, f64) = (0.07, 0.20);
pub const HF_HZ: (f64, f64) = (0.20, 0.50);

/// Named frequency range. All ranges are closed intervals in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Band {
    Vlf,
    Lf,
    Hf,
    /// Union of VLF, LF and HF.
    All,
    /// Every computed bin.
    Full,
}

impl Band {
    /// The three physiological bands reported per case.
    pub const REPORTED: [Band; 3] = [Band::Vlf, Band::Lf, Band::Hf];

    /// Closed range in Hz; `Full` needs the frequency axis to find its upper edge.
    pub fn range(&self, freq: &[f64]) -> (f64, f64) {
        match self {
            Band::Vlf => VLF_HZ,
            Band::Lf => LF_HZ,
            Band::Hf => HF_HZ,
            Band::All => (VLF_HZ.0, HF_HZ.1),
            Band::Full => (0.0, freq.last().copied().unwrap_or(0.0)),
        }
    }

    /// Indices of the bins of `freq` that fall inside the band.
    pub fn indices(&self, freq: &[f64]) -> Vec<usize> {
        let (lo, hi) = self.range(freq);
        freq.iter()
            .enumerate()
            .filter(|(_, f)| **f >= lo && **f <= hi)
            .map(|(i, _)| i)
            .collect()
    }

    /// Values of `values` whose bin lies in the band.
    pub fn select<T: Copy>(&self, freq: &[f64], values: &[T]) -> Vec<T> {
        self.indices(freq)
            .into_iter()
            .filter_map(|i| values.get(i).copied())
            .collect()
    }
}

impl FromStr for Band {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VLF" => Ok(Band::Vlf),
            "LF" => Ok(Band::Lf),
            "HF" => Ok(Band::Hf),
            "ALL" => Ok(Band::All),
            "FULL" => Ok(Band::Full),
            _ => Err(ConfigError::UnknownBand(s.to_string())),
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Band::Vlf => "VLF",
            Band::Lf => "LF",
            Band::Hf => "HF",
            Band::All => "ALL",
            Band::Full => "FULL",
        };
        f.write_str(label)
    }
}

/// Mean, population standard deviation and extremes of the known values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics<T = f64> {
    pub mean: T,
    pub std: T,
    pub min: T,
    pub max: T,
}

impl<T: Float> BandStatistics<T> {
    /// NaN-aware reduction: NaN entries are skipped, `None` if nothing is left.
    pub fn from_values(values: &[T]) -> Option<Self> {
        let known: Vec<T> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if known.is_empty() {
            return None;
        }
        let n = T::from(known.len())?;
        let mean = known.iter().fold(T::zero(), |acc, &v| acc + v) / n;
        let var = known
            .iter()
            .fold(T::zero(), |acc, &v| acc + (v - mean) * (v - mean))
            / n;
        let min = known.iter().copied().fold(T::infinity(), T::min);
        let max = known.iter().copied().fold(T::neg_infinity(), T::max);
        Some(Self {
            mean,
            std: var.sqrt(),
            min,
            max,
        })
    }

    /// Applies a positive linear scale (e.g. a unit change) to every field.
    pub fn scaled(&self, factor: T) -> Self {
        Self {
            mean: self.mean * factor,
            std: self.std * factor.abs(),
            min: self.min * factor,
            max: self.max * factor,
        }
    }
}

/// Statistics of `values` restricted to `band`.
pub fn band_statistics(freq: &[f64], values: &[f64], band: Band) -> Option<BandStatistics> {
    BandStatistics::from_values(&band.select(freq, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize, df: f64) -> Vec<f64> {
        (0..n).map(|k| k as f64 * df).collect()
    }

    #[test]
    fn band_edges_are_inclusive() {
        let freq = vec![0.0, 0.02, 0.05, 0.07, 0.1, 0.2, 0.35, 0.5, 0.6];
        assert_eq!(Band::Vlf.indices(&freq), vec![1, 2, 3]);
        assert_eq!(Band::Lf.indices(&freq), vec![3, 4, 5]);
        assert_eq!(Band::Hf.indices(&freq), vec![5, 6, 7]);
        assert_eq!(Band::All.indices(&freq), (1..8).collect::<Vec<_>>());
        assert_eq!(Band::Full.indices(&freq).len(), freq.len());
    }

    #[test]
    fn constant_in_lf_and_unknown_elsewhere() {
        let freq = axis(64, 5.0 / 64.0);
        let values: Vec<f64> = freq
            .iter()
            .map(|f| {
                if (LF_HZ.0..=LF_HZ.1).contains(f) {
                    1.75
                } else {
                    f64::NAN
                }
            })
            .collect();
        let stats = band_statistics(&freq, &values, Band::Lf).unwrap();
        assert_eq!(
            stats,
            BandStatistics {
                mean: 1.75,
                std: 0.0,
                min: 1.75,
                max: 1.75
            }
        );
        assert!(band_statistics(&freq, &values, Band::Hf).is_none());
    }

    #[test]
    fn statistics_skip_nan_entries() {
        let stats = BandStatistics::from_values(&[1.0_f32, f32::NAN, 3.0]).unwrap();
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std, 1.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert!(BandStatistics::<f64>::from_values(&[]).is_none());
    }

    #[test]
    fn band_names_parse_case_insensitively() {
        assert_eq!("lf".parse(), Ok(Band::Lf));
        assert_eq!("Full".parse(), Ok(Band::Full));
        assert!(matches!(
            "mid".parse::<Band>(),
            Err(ConfigError::UnknownBand(_))
        ));
    }
}
