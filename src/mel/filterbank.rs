use ndarray::{Array2, ArrayView2};
use tracing::warn;

use crate::config::TransformConfig;
use crate::error::{MelError, ShapeError, try_zeroed};

/// Triangular mel filters mapping one-sided FFT bins onto mel bands.
///
/// Shape is `(num_mels, n_fft / 2 + 1)`. Filters use the HTK mel scale with
/// no area normalization, evaluated at linearly spaced bin frequencies.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterBank {
    weights: Array2<f32>,
    centers_hz: Vec<f32>,
}

impl FilterBank {
    pub fn new(config: &TransformConfig) -> Result<Self, MelError> {
        config.validate()?;
        let n_freqs = config.freq_bins();
        let n_mels = config.num_mels;
        let bin_freqs = bin_frequencies(config.sample_rate, n_freqs);
        let edges = mel_edges_hz(config.f_min, config.f_max, n_mels);

        let mut flat = try_zeroed::<f32>("mel filterbank", n_mels * n_freqs)?;
        for (band, row) in flat.chunks_mut(n_freqs.max(1)).enumerate().take(n_mels) {
            let (left, center, right) = (edges[band], edges[band + 1], edges[band + 2]);
            fill_triangle(row, &bin_freqs, left, center, right);
            if row.iter().all(|&w| w == 0.0) {
                warn!(
                    band,
                    left_hz = left,
                    right_hz = right,
                    "Mel filter has no non-zero weights; n_mels may be too high for n_fft"
                );
            }
        }

        let weights = Array2::from_shape_vec((n_mels, n_freqs), flat).map_err(ShapeError::from)?;
        let centers_hz = edges[1..=n_mels].iter().map(|&hz| hz as f32).collect();
        Ok(Self {
            weights,
            centers_hz,
        })
    }

    pub fn num_mels(&self) -> usize {
        self.weights.nrows()
    }

    pub fn freq_bins(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    /// Peak frequency of each mel band, in Hz.
    pub fn center_frequencies(&self) -> &[f32] {
        &self.centers_hz
    }

    /// Project a `(freq_bins, frames)` magnitude spectrum to `(num_mels, frames)`.
    pub fn project(&self, magnitude: ArrayView2<'_, f32>) -> Result<Array2<f32>, ShapeError> {
        if magnitude.nrows() != self.freq_bins() {
            return Err(ShapeError::FrequencyBins {
                expected: self.freq_bins(),
                actual: magnitude.nrows(),
            });
        }
        Ok(self.weights.dot(&magnitude))
    }
}

fn fill_triangle(row: &mut [f32], bin_freqs: &[f64], left: f64, center: f64, right: f64) {
    for (weight, &freq) in row.iter_mut().zip(bin_freqs) {
        let rising = (freq - left) / (center - left);
        let falling = (right - freq) / (right - center);
        *weight = rising.min(falling).max(0.0) as f32;
    }
}

/// Frequencies of the one-sided bins, spaced linearly from 0 to the integer Nyquist.
fn bin_frequencies(sample_rate: u32, n_freqs: usize) -> Vec<f64> {
    let nyquist = (sample_rate / 2) as f64;
    if n_freqs <= 1 {
        return vec![0.0; n_freqs];
    }
    let step = nyquist / (n_freqs - 1) as f64;
    (0..n_freqs).map(|i| i as f64 * step).collect()
}

/// `n_mels + 2` band edges, equally spaced on the mel scale.
fn mel_edges_hz(f_min: f32, f_max: f32, n_mels: usize) -> Vec<f64> {
    let mel_min = hz_to_mel(f_min as f64);
    let mel_max = hz_to_mel(f_max as f64);
    let steps = (n_mels + 1) as f64;
    (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / steps))
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use ndarray::Array2;

    #[test]
    fn default_bank_has_expected_shape() {
        let bank = FilterBank::new(&TransformConfig::default()).unwrap();
        assert_eq!(bank.num_mels(), 80);
        assert_eq!(bank.freq_bins(), 961);
        assert_eq!(bank.center_frequencies().len(), 80);
    }

    #[test]
    fn weights_are_bounded_triangles() {
        let bank = FilterBank::new(&TransformConfig::default()).unwrap();
        assert!(bank.weights().iter().all(|&w| (0.0..=1.0).contains(&w)));
        for row in bank.weights().rows() {
            assert!(row.iter().any(|&w| w > 0.0));
        }
    }

    #[test]
    fn bins_above_fmax_are_unused() {
        let config = TransformConfig::default();
        let bank = FilterBank::new(&config).unwrap();
        // bin spacing is 12.5 Hz at 24 kHz / 1920
        let first_unused = (config.f_max / 12.5) as usize + 1;
        for row in bank.weights().rows() {
            assert!(row.iter().skip(first_unused).all(|&w| w == 0.0));
        }
    }

    #[test]
    fn centers_increase_within_range() {
        let bank = FilterBank::new(&TransformConfig::default()).unwrap();
        let centers = bank.center_frequencies();
        assert!(centers.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(centers[0] > 0.0);
        assert!(*centers.last().unwrap() < 8_000.0);
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 8_000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn project_is_a_matrix_product() {
        let bank = FilterBank::new(&TransformConfig::default()).unwrap();
        let ones = Array2::<f32>::ones((bank.freq_bins(), 3));
        let mel = bank.project(ones.view()).unwrap();
        assert_eq!(mel.dim(), (80, 3));
        for (band, row) in bank.weights().rows().into_iter().enumerate() {
            let expected: f32 = row.sum();
            assert!((mel[(band, 0)] - expected).abs() < 1e-4);
            assert!((mel[(band, 0)] - mel[(band, 2)]).abs() < 1e-5);
        }
    }

    #[test]
    fn project_rejects_mismatched_bins() {
        let bank = FilterBank::new(&TransformConfig::default()).unwrap();
        let wrong = Array2::<f32>::zeros((10, 2));
        let err = bank.project(wrong.view()).unwrap_err();
        assert!(matches!(
            err,
            ShapeError::FrequencyBins {
                expected: 961,
                actual: 10
            }
        ));
    }

    #[test]
    fn empty_frequency_range_is_a_config_error() {
        let config = TransformConfig {
            f_min: 0.0,
            f_max: 0.0,
            ..TransformConfig::default()
        };
        assert!(matches!(
            FilterBank::new(&config),
            Err(MelError::Config(ConfigError::InvalidParameter { name: "f_max", .. }))
        ));
    }
}
