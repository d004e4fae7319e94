//! Log-mel spectrogram features for a 24 kHz speech vocoder.
/// Transform parameters and TOML loading.
pub mod config;
/// Error taxonomy shared by all entry points.
pub mod error;
/// Optional tracing subscriber setup for host applications.
pub mod logging;
/// Feature extraction pipeline and its analysis cache.
pub mod mel;

pub use config::{ComputeTarget, TransformConfig};
pub use error::{ConfigError, MelError, ResourceError, ShapeError};
pub use mel::{
    AnalysisCache, MelExtractor, Waveform, extract_mel_spectrogram,
    extract_mel_spectrogram_with_cache,
};
