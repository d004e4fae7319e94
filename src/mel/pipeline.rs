use std::sync::Arc;

use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;
use rustfft::Fft;
use tracing::{trace, warn};

use crate::config::TransformConfig;
use crate::error::{ConfigError, MelError, ShapeError, try_zeroed};

use super::cache::AnalysisCache;
use super::compress::compress;
use super::filterbank::FilterBank;
use super::framer;
use super::stft::{self, SpectralAnalyzer, magnitude};
use super::waveform::Waveform;

/// Validated transform bound to an analysis cache.
///
/// The forward FFT is planned once here and shared by every extraction.
pub struct MelExtractor<'c> {
    config: TransformConfig,
    cache: &'c AnalysisCache,
    fft: Arc<dyn Fft<f32>>,
}

impl<'c> MelExtractor<'c> {
    pub fn new(config: TransformConfig, cache: &'c AnalysisCache) -> Result<Self, ConfigError> {
        config.validate()?;
        let fft = stft::plan_forward(config.n_fft);
        Ok(Self { config, cache, fft })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Frames produced for signals of `num_samples` samples.
    pub fn frame_count(&self, num_samples: usize) -> Result<usize, ShapeError> {
        let padded = num_samples + 2 * self.config.framing_pad();
        stft::frame_count(
            stft::analysis_len(padded, self.config.n_fft, self.config.center),
            self.config.win_size,
            self.config.hop_size,
        )
    }

    /// Log-mel spectrogram with shape `[batch, num_mels, frames]`.
    pub fn extract(&self, waveform: &Waveform<'_>) -> Result<Array3<f32>, MelError> {
        let mut mel = self.energies(waveform)?;
        compress(&mut mel, self.config.clip_floor, self.config.compression_scale);
        Ok(mel)
    }

    /// Mel energies before dynamic-range compression.
    pub fn energies(&self, waveform: &Waveform<'_>) -> Result<Array3<f32>, MelError> {
        let batch = waveform.batch_size();
        let frames = self.frame_count(waveform.num_samples())?;
        trace!(
            batch,
            samples = waveform.num_samples(),
            frames,
            "Extracting mel spectrogram"
        );
        report_out_of_range(waveform);

        let analyzer = self.analyzer()?;
        let bank = self.cache.filter_bank(&self.config)?;

        let per_signal = (0..batch)
            .into_par_iter()
            .map(|index| self.signal_energies(waveform, index, &analyzer, &bank))
            .collect::<Result<Vec<_>, MelError>>()?;

        let num_mels = self.config.num_mels;
        let flat = try_zeroed::<f32>("mel spectrogram", batch * num_mels * frames)?;
        let mut out = Array3::from_shape_vec((batch, num_mels, frames), flat)
            .map_err(ShapeError::from)?;
        for (mut slot, energies) in out.axis_iter_mut(Axis(0)).zip(&per_signal) {
            slot.assign(energies);
        }
        Ok(out)
    }

    fn analyzer(&self) -> Result<SpectralAnalyzer, MelError> {
        let window = self.cache.window(&self.config)?;
        SpectralAnalyzer::with_plan(&self.config, window, Arc::clone(&self.fft))
    }

    fn signal_energies(
        &self,
        waveform: &Waveform<'_>,
        index: usize,
        analyzer: &SpectralAnalyzer,
        bank: &FilterBank,
    ) -> Result<Array2<f32>, MelError> {
        let signal = waveform.signal(index);
        let padded = framer::pad(&signal, &self.config)?;
        let spectrum = analyzer.transform(&padded)?;
        let magnitudes = magnitude(spectrum.view());
        Ok(bank.project(magnitudes.view())?)
    }
}

/// Log-mel spectrogram using the process-wide [`AnalysisCache`].
pub fn extract_mel_spectrogram(
    waveform: &Waveform<'_>,
    config: &TransformConfig,
) -> Result<Array3<f32>, MelError> {
    extract_mel_spectrogram_with_cache(waveform, config, AnalysisCache::global())
}

pub fn extract_mel_spectrogram_with_cache(
    waveform: &Waveform<'_>,
    config: &TransformConfig,
    cache: &AnalysisCache,
) -> Result<Array3<f32>, MelError> {
    MelExtractor::new(config.clone(), cache)?.extract(waveform)
}

// Upstream is trusted to normalize; out-of-range input is reported, never altered.
fn report_out_of_range(waveform: &Waveform<'_>) {
    let Some((min, max)) = waveform.amplitude_range() else {
        return;
    };
    if min < -1.0 {
        warn!(min, "Waveform minimum is below -1.0");
    }
    if max > 1.0 {
        warn!(max, "Waveform maximum is above 1.0");
    }
}
