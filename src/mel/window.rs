use std::f32::consts::PI;
use std::ops::Deref;

use crate::error::{ResourceError, try_zeroed};

/// Periodic Hann window applied to each analysis frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisWindow {
    weights: Vec<f32>,
}

impl AnalysisWindow {
    /// Build a periodic Hann window: `0.5 - 0.5 * cos(2 * pi * n / len)`.
    pub fn hann(len: usize) -> Result<Self, ResourceError> {
        let mut weights = try_zeroed::<f32>("analysis window", len)?;
        if len == 1 {
            weights[0] = 1.0;
        } else {
            let denom = len as f32;
            for (n, weight) in weights.iter_mut().enumerate() {
                *weight = 0.5_f32 - 0.5 * (2.0 * PI * n as f32 / denom).cos();
            }
        }
        Ok(Self { weights })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }
}

impl Deref for AnalysisWindow {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_periodic_and_zero_at_start() {
        let w = AnalysisWindow::hann(8).unwrap();
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
        // periodic: symmetric around len / 2, last sample is not zero
        assert!((w[1] - w[7]).abs() < 1e-6);
        assert!(w[7] > 0.1);
    }

    #[test]
    fn single_sample_window_is_unity() {
        assert_eq!(AnalysisWindow::hann(1).unwrap().as_slice(), &[1.0]);
    }

    #[test]
    fn empty_window_is_empty() {
        assert!(AnalysisWindow::hann(0).unwrap().is_empty());
    }
}
