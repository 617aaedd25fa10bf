use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest segment count covered by the critical-value tables.
pub const MIN_TABULATED_SEGMENTS: usize = 3;
/// Largest segment count covered by the critical-value tables.
pub const MAX_TABULATED_SEGMENTS: usize = 15;

const CRITICAL_1: [f64; 13] = [
    0.43, 0.33, 0.27, 0.23, 0.20, 0.18, 0.16, 0.14, 0.13, 0.12, 0.11, 0.10, 0.10,
];
const CRITICAL_5: [f64; 13] = [
    0.51, 0.40, 0.34, 0.29, 0.25, 0.22, 0.20, 0.18, 0.17, 0.15, 0.14, 0.13, 0.12,
];
const CRITICAL_10: [f64; 13] = [
    0.65, 0.54, 0.46, 0.40, 0.35, 0.32, 0.29, 0.26, 0.24, 0.22, 0.21, 0.19, 0.18,
];

/// Significance level of the coherence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignificanceLevel {
    #[serde(rename = "1%")]
    OnePercent,
    #[serde(rename = "5%")]
    FivePercent,
    #[serde(rename = "10%")]
    TenPercent,
}

impl Default for SignificanceLevel {
    fn default() -> Self {
        SignificanceLevel::FivePercent
    }
}

impl FromStr for SignificanceLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('%') {
            "1" | "0.01" => Ok(SignificanceLevel::OnePercent),
            "5" | "0.05" => Ok(SignificanceLevel::FivePercent),
            "10" | "0.1" | "0.10" => Ok(SignificanceLevel::TenPercent),
            _ => Err(ConfigError::UnknownSignificance(s.to_string())),
        }
    }
}

impl fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignificanceLevel::OnePercent => "1%",
            SignificanceLevel::FivePercent => "5%",
            SignificanceLevel::TenPercent => "10%",
        };
        f.write_str(label)
    }
}

/// Coherence cut-off for a given number of averaged segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CriticalCoherence {
    /// Too few segments: coherence carries no information, every bin is masked.
    MaskAll,
    /// Beyond the tables: no masking.
    Unbounded,
    Value(f64),
}

impl CriticalCoherence {
    /// Whether a bin with coherence `c` is kept. Unknown coherence is never kept.
    pub fn passes(&self, c: f64) -> bool {
        match self {
            CriticalCoherence::MaskAll => false,
            CriticalCoherence::Unbounded => true,
            CriticalCoherence::Value(limit) => c >= *limit,
        }
    }
}

pub fn critical_coherence(level: SignificanceLevel, n_segments: usize) -> CriticalCoherence {
    if n_segments < MIN_TABULATED_SEGMENTS {
        return CriticalCoherence::MaskAll;
    }
    if n_segments > MAX_TABULATED_SEGMENTS {
        return CriticalCoherence::Unbounded;
    }
    let table = match level {
        SignificanceLevel::OnePercent => &CRITICAL_1,
        SignificanceLevel::FivePercent => &CRITICAL_5,
        SignificanceLevel::TenPercent => &CRITICAL_10,
    };
    CriticalCoherence::Value(table[n_segments - MIN_TABULATED_SEGMENTS])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_cover_three_to_fifteen_segments() {
        assert_eq!(
            critical_coherence(SignificanceLevel::FivePercent, 3),
            CriticalCoherence::Value(0.51)
        );
        assert_eq!(
            critical_coherence(SignificanceLevel::OnePercent, 15),
            CriticalCoherence::Value(0.10)
        );
        assert_eq!(
            critical_coherence(SignificanceLevel::TenPercent, 7),
            CriticalCoherence::Value(0.35)
        );
        assert_eq!(
            critical_coherence(SignificanceLevel::FivePercent, 16),
            CriticalCoherence::Unbounded
        );
        assert_eq!(
            critical_coherence(SignificanceLevel::FivePercent, 2),
            CriticalCoherence::MaskAll
        );
    }

    #[test]
    fn nan_coherence_never_passes() {
        assert!(!CriticalCoherence::Value(0.2).passes(f64::NAN));
        assert!(CriticalCoherence::Unbounded.passes(0.0));
        assert!(!CriticalCoherence::MaskAll.passes(1.0));
    }

    #[test]
    fn level_names_parse() {
        assert_eq!("5%".parse(), Ok(SignificanceLevel::FivePercent));
        assert_eq!("0.01".parse(), Ok(SignificanceLevel::OnePercent));
        assert_eq!("10".parse(), Ok(SignificanceLevel::TenPercent));
        assert!("2%".parse::<SignificanceLevel>().is_err());
    }
}
