//! Complex sequences travel as `[re, im]` pairs so JSON consumers do not need
//! to know about `num_complex`.

use realfft::num_complex::Complex64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(values: &[Complex64], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let pairs: Vec<[f64; 2]> = values.iter().map(|c| [c.re, c.im]).collect();
    pairs.serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Complex64>, D::Error>
where
    D: Deserializer<'de>,
{
    let pairs: Vec<[f64; 2]> = Vec::deserialize(deserializer)?;
    Ok(pairs
        .into_iter()
        .map(|[re, im]| Complex64::new(re, im))
        .collect())
}
