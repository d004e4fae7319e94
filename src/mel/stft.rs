use std::borrow::Cow;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner, Length};

use crate::config::TransformConfig;
use crate::error::{ConfigError, MelError, ShapeError, try_zeroed};

use super::framer::reflect_pad;
use super::window::AnalysisWindow;

/// Added to the squared magnitude so the square root stays differentiable at zero.
pub const MAGNITUDE_EPSILON: f32 = 1e-9;

/// Short-time Fourier transform over already-padded signals.
pub struct SpectralAnalyzer {
    n_fft: usize,
    hop_size: usize,
    center: bool,
    window: Arc<AnalysisWindow>,
    fft: Arc<dyn Fft<f32>>,
}

struct StftWorkspace {
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralAnalyzer {
    /// Plan a forward FFT for `config.n_fft` and bind it to `window`.
    ///
    /// The config is validated and the window must hold `win_size` weights.
    pub fn new(config: &TransformConfig, window: Arc<AnalysisWindow>) -> Result<Self, MelError> {
        config.validate()?;
        Self::with_plan(config, window, plan_forward(config.n_fft))
    }

    /// Like [`SpectralAnalyzer::new`] but reuses an FFT planned earlier.
    pub(super) fn with_plan(
        config: &TransformConfig,
        window: Arc<AnalysisWindow>,
        fft: Arc<dyn Fft<f32>>,
    ) -> Result<Self, MelError> {
        if window.len() != config.win_size {
            return Err(ConfigError::InvalidParameter {
                name: "win_size",
                reason: format!(
                    "window has {} weights, expected {}",
                    window.len(),
                    config.win_size
                ),
            }
            .into());
        }
        if fft.len() != config.n_fft {
            return Err(ConfigError::InvalidParameter {
                name: "n_fft",
                reason: format!("FFT plan has length {}, expected {}", fft.len(), config.n_fft),
            }
            .into());
        }
        Ok(Self {
            n_fft: config.n_fft,
            hop_size: config.hop_size,
            center: config.center,
            window,
            fft,
        })
    }

    pub(super) fn plan(&self) -> &Arc<dyn Fft<f32>> {
        &self.fft
    }

    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frames produced for a signal of `padded_len` samples.
    pub fn frame_count(&self, padded_len: usize) -> Result<usize, ShapeError> {
        frame_count(
            analysis_len(padded_len, self.n_fft, self.center),
            self.window.len(),
            self.hop_size,
        )
    }

    /// One-sided complex spectrum with shape `(freq_bins, frames)`.
    ///
    /// Frame `i` covers samples `[i * hop, i * hop + win)`; the windowed slice
    /// is zero-padded to `n_fft` before the FFT. With centering off no other
    /// padding is applied. When `win < n_fft` frames therefore start at the
    /// hop grid rather than sitting centered inside an `n_fft` span.
    pub fn transform(&self, padded: &[f32]) -> Result<Array2<Complex32>, MelError> {
        let signal: Cow<'_, [f32]> = if self.center {
            let half = self.n_fft / 2;
            Cow::Owned(reflect_pad(padded, half, half)?)
        } else {
            Cow::Borrowed(padded)
        };
        let win_size = self.window.len();
        let frames = frame_count(signal.len(), win_size, self.hop_size)?;
        let bins = self.freq_bins();

        let mut flat = try_zeroed::<Complex32>("complex spectrum", frames * bins)?;
        let scratch_len = self.fft.get_inplace_scratch_len();
        flat.par_chunks_mut(bins).enumerate().for_each_init(
            || StftWorkspace {
                buffer: vec![Complex32::default(); self.n_fft],
                scratch: vec![Complex32::default(); scratch_len],
            },
            |workspace, (frame, out)| {
                let start = frame * self.hop_size;
                let slice = &signal[start..start + win_size];
                fill_windowed(&mut workspace.buffer, slice, &self.window);
                self.fft
                    .process_with_scratch(&mut workspace.buffer, &mut workspace.scratch);
                out.copy_from_slice(&workspace.buffer[..bins]);
            },
        );

        let spectrum = Array2::from_shape_vec((frames, bins), flat).map_err(ShapeError::from)?;
        Ok(spectrum.reversed_axes())
    }
}

pub(super) fn plan_forward(n_fft: usize) -> Arc<dyn Fft<f32>> {
    FftPlanner::<f32>::new().plan_fft_forward(n_fft)
}

/// Signal length the frames are cut from, including the centering pad when enabled.
pub(super) fn analysis_len(padded_len: usize, n_fft: usize, center: bool) -> usize {
    if center {
        padded_len + 2 * (n_fft / 2)
    } else {
        padded_len
    }
}

/// `floor((padded_len - win_size) / hop_size) + 1`, rejecting negative results.
pub fn frame_count(padded_len: usize, win_size: usize, hop_size: usize) -> Result<usize, ShapeError> {
    let hop = hop_size.max(1) as i128;
    let span = padded_len as i128 - win_size as i128;
    let frames = span.div_euclid(hop) + 1;
    if frames < 0 {
        return Err(ShapeError::NegativeFrameCount {
            padded_len,
            win_size,
            hop_size,
        });
    }
    Ok(frames as usize)
}

/// `sqrt(re^2 + im^2 + eps)` per element.
pub fn magnitude(spectrum: ArrayView2<'_, Complex32>) -> Array2<f32> {
    spectrum.mapv(|c| (c.re * c.re + c.im * c.im + MAGNITUDE_EPSILON).sqrt())
}

fn fill_windowed(target: &mut [Complex32], slice: &[f32], window: &[f32]) {
    let (head, tail) = target.split_at_mut(slice.len());
    for ((cell, &sample), &weight) in head.iter_mut().zip(slice).zip(window) {
        *cell = Complex32::new(sample * weight, 0.0);
    }
    tail.fill(Complex32::default());
}
