//! Gaussian kernel density estimate used by the speed distribution plot.

use std::f64::consts::PI;

use crate::analyzers::utility::{mean, min_max, stddev};

/// Number of bandwidths the evaluation grid extends past the data.
pub const DEFAULT_CUT: f64 = 3.0;
/// Evaluation points per curve.
pub const DEFAULT_GRID_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct Kde {
    values: Vec<f64>,
    bandwidth: f64,
}

impl Kde {
    /// Fits a KDE with Scott's rule bandwidth.
    ///
    /// Returns `None` when the bandwidth would be zero, i.e. fewer than two
    /// distinct finite values.
    pub fn fit(values: &[f64]) -> Option<Self> {
        let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let bandwidth = scott_bandwidth(&values);
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return None;
        }
        Some(Self { values, bandwidth })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Density at `x`.
    pub fn density(&self, x: f64) -> f64 {
        let h = self.bandwidth;
        let norm = 1.0 / (self.values.len() as f64 * h * (2.0 * PI).sqrt());
        self.values
            .iter()
            .map(|v| {
                let z = (x - v) / h;
                (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            * norm
    }

    /// Data range widened by `cut` bandwidths on each side.
    pub fn support(&self, cut: f64) -> (f64, f64) {
        let (lo, hi) = min_max(self.values.iter().copied()).unwrap_or((0.0, 0.0));
        (lo - cut * self.bandwidth, hi + cut * self.bandwidth)
    }

    /// Evaluates the density on `points` evenly spaced positions across the
    /// support.
    pub fn curve(&self, cut: f64, points: usize) -> Vec<(f64, f64)> {
        let (lo, hi) = self.support(cut);
        let steps = points.max(2) - 1;
        let dx = (hi - lo) / steps as f64;
        (0..=steps)
            .map(|i| {
                let x = lo + dx * i as f64;
                (x, self.density(x))
            })
            .collect()
    }
}

/// Scott's rule: sample standard deviation times `n^(-1/5)`.
pub fn scott_bandwidth(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sd = stddev(values, mean(values));
    sd * (values.len() as f64).powf(-0.2)
}
