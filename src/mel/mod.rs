//! Log-mel spectrogram extraction for a 24 kHz vocoder.
//!
//! waveform -> reflect pad -> STFT -> magnitude -> mel projection -> log compression.
//! Filterbanks and windows come from an [`AnalysisCache`].

mod cache;
mod compress;
mod filterbank;
mod framer;
mod pipeline;
mod stft;
mod waveform;
mod window;

pub use cache::{AnalysisCache, FilterBankKey, WindowKey};
pub use compress::{compress, spectral_normalize};
pub use filterbank::FilterBank;
pub use framer::{pad, reflect_pad};
pub use pipeline::{MelExtractor, extract_mel_spectrogram, extract_mel_spectrogram_with_cache};
pub use stft::{MAGNITUDE_EPSILON, SpectralAnalyzer, frame_count, magnitude};
pub use waveform::Waveform;
pub use window::AnalysisWindow;
