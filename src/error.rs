//! Error taxonomy for mel spectrogram extraction.
//!
//! Configuration and shape problems are reported before any spectral work
//! starts; resource failures come from the analysis cache or from buffer
//! allocation during the transform.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by the extraction entry points.
#[derive(Debug, Error)]
pub enum MelError {
    /// Transform parameters were rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The input waveform (or the frame layout derived from it) is invalid.
    #[error(transparent)]
    Shape(#[from] ShapeError),
    /// A buffer or cached table could not be allocated.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Invalid or unreadable transform configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter failed validation.
    #[error("Invalid transform parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Field name as it appears in the TOML table.
        name: &'static str,
        /// Human readable reason.
        reason: String,
    },
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse a TOML config.
    #[error("Invalid transform config at {path}: {source}")]
    ParseToml {
        /// TOML file path, or `<inline>` for string input.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to serialize a config to TOML.
    #[error("Failed to serialize transform config: {source}")]
    SerializeToml {
        /// TOML serialization error.
        source: toml::ser::Error,
    },
}

/// Input waveform with an unusable shape.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// Waveforms must be `[samples]` or `[batch, samples]`.
    #[error("Waveform must be 1-D or 2-D, got rank {rank}")]
    Rank {
        /// Rank of the rejected input.
        rank: usize,
    },
    /// A batch with no signals in it.
    #[error("Waveform batch is empty")]
    EmptyBatch,
    /// The padded signal is too short to produce even a zero-length frame axis.
    #[error(
        "Padded length {padded_len} yields a negative frame count for window {win_size} and hop {hop_size}"
    )]
    NegativeFrameCount {
        /// Signal length after framing pads.
        padded_len: usize,
        /// Analysis window length.
        win_size: usize,
        /// Hop between frames.
        hop_size: usize,
    },
    /// A magnitude spectrum whose bin count does not match the filterbank.
    #[error("Spectrum has {actual} frequency bins, filterbank expects {expected}")]
    FrequencyBins {
        /// Bins per frame the filterbank was built for.
        expected: usize,
        /// Bins per frame in the rejected spectrum.
        actual: usize,
    },
    /// ndarray rejected a reshape of the spectral buffers.
    #[error("Spectral buffer layout mismatch: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// Allocation failures while building buffers or cached tables.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// `try_reserve_exact` refused the requested capacity.
    #[error("Failed to allocate {len} elements for {what}")]
    Allocation {
        /// Which buffer was being allocated.
        what: &'static str,
        /// Requested element count.
        len: usize,
    },
}

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(
    what: &'static str,
    len: usize,
) -> Result<Vec<T>, ResourceError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ResourceError::Allocation { what, len })?;
    buf.resize(len, T::default());
    Ok(buf)
}
