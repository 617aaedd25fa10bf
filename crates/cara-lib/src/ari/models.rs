use serde::{Deserialize, Serialize};

/// Second-order autoregulation model: time constant `t` (s), damping `d` and
/// feedback gain `k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceModel {
    pub t: f64,
    pub d: f64,
    pub k: f64,
}

const fn model(t: f64, d: f64, k: f64) -> ReferenceModel {
    ReferenceModel { t, d, k }
}

/// Reference models for ARI 0 (no autoregulation) to 9 (fastest, strongest).
pub const REFERENCE_MODELS: [ReferenceModel; 10] = [
    model(2.00, 0.00, 0.00),
    model(2.00, 1.60, 0.20),
    model(2.00, 1.50, 0.40),
    model(2.00, 1.15, 0.60),
    model(2.00, 0.90, 0.80),
    model(1.90, 0.75, 0.90),
    model(1.60, 0.65, 0.94),
    model(1.20, 0.55, 0.96),
    model(0.87, 0.52, 0.97),
    model(0.65, 0.50, 0.98),
];

impl ReferenceModel {
    /// Euler simulation of the model driven by the normalised pressure `input`
    /// sampled every `dt` seconds. States beyond `limit` in magnitude are reset.
    pub fn simulate(&self, input: &[f64], dt: f64, limit: f64) -> Vec<f64> {
        let mut x1 = 0.0;
        let mut x2 = 0.0;
        let step = dt / self.t;
        input
            .iter()
            .map(|&u| {
                let y = u - self.k * x2;
                let nx1 = x1 + step * (u - x2);
                let nx2 = x2 + step * (x1 - 2.0 * self.d * x2);
                x1 = if nx1.abs() > limit { 0.0 } else { nx1 };
                x2 = if nx2.abs() > limit { 0.0 } else { nx2 };
                y
            })
            .collect()
    }
}

/// Single-pole exponential smoother seeded with the first sample.
pub(crate) fn exponential_smooth(data: &[f64], dt: f64, time_constant: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let alpha = dt / (time_constant + dt);
    let mut y = data[0];
    data.iter()
        .map(|&x| {
            y += alpha * (x - y);
            y
        })
        .collect()
}
