//! Transform parameters and their TOML representation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// FFT length; 12.5 Hz bins at 24 kHz.
pub const DEFAULT_N_FFT: usize = 1920;
/// Mel bands in the output.
pub const DEFAULT_NUM_MELS: usize = 80;
/// Input sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
/// Samples between frame starts (20 ms).
pub const DEFAULT_HOP_SIZE: usize = 480;
/// Analysis window length.
pub const DEFAULT_WIN_SIZE: usize = 1920;
/// Lowest filterbank edge in Hz.
pub const DEFAULT_F_MIN_HZ: f32 = 0.0;
/// Highest filterbank edge in Hz.
pub const DEFAULT_F_MAX_HZ: f32 = 8_000.0;
/// Floor applied before the logarithm in dynamic-range compression.
pub const DEFAULT_CLIP_FLOOR: f32 = 1e-5;
/// Multiplier applied inside the logarithm.
pub const DEFAULT_COMPRESSION_SCALE: f32 = 1.0;

const INLINE_SOURCE: &str = "<inline>";

/// Identifier for where cached tables are meant to live.
///
/// All arithmetic in this crate runs on the host; the target only partitions
/// cache entries so tables for different devices or precisions never alias.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComputeTarget {
    #[default]
    Cpu,
    /// A named accelerator, e.g. `cuda:0` or `metal:1`.
    Accelerator { kind: String, ordinal: u32 },
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeTarget::Cpu => f.write_str("cpu"),
            ComputeTarget::Accelerator { kind, ordinal } => write!(f, "{kind}:{ordinal}"),
        }
    }
}

impl FromStr for ComputeTarget {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().to_ascii_lowercase();
        let (kind, ordinal) = match trimmed.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal = ordinal.parse::<u32>().map_err(|err| invalid_target(value, err))?;
                (kind.to_string(), ordinal)
            }
            None => (trimmed, 0),
        };
        if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid_target(value, "device kind must be alphanumeric"));
        }
        if kind == "cpu" {
            return Ok(ComputeTarget::Cpu);
        }
        Ok(ComputeTarget::Accelerator { kind, ordinal })
    }
}

impl TryFrom<String> for ComputeTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComputeTarget> for String {
    fn from(target: ComputeTarget) -> Self {
        target.to_string()
    }
}

fn invalid_target(value: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::InvalidParameter {
        name: "compute_target",
        reason: format!("`{value}`: {reason}"),
    }
}

/// Immutable parameter set for one mel spectrogram transform.
///
/// Defaults match the feature layout the downstream vocoder was trained on.
/// Missing TOML fields fall back to those defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub n_fft: usize,
    pub num_mels: usize,
    pub sample_rate: u32,
    pub hop_size: usize,
    pub win_size: usize,
    pub f_min: f32,
    pub f_max: f32,
    pub center: bool,
    pub compute_target: ComputeTarget,
    pub clip_floor: f32,
    pub compression_scale: f32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            n_fft: DEFAULT_N_FFT,
            num_mels: DEFAULT_NUM_MELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            hop_size: DEFAULT_HOP_SIZE,
            win_size: DEFAULT_WIN_SIZE,
            f_min: DEFAULT_F_MIN_HZ,
            f_max: DEFAULT_F_MAX_HZ,
            center: false,
            compute_target: ComputeTarget::Cpu,
            clip_floor: DEFAULT_CLIP_FLOOR,
            compression_scale: DEFAULT_COMPRESSION_SCALE,
        }
    }
}

impl TransformConfig {
    /// Number of one-sided frequency bins produced per frame.
    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Reflect pad applied to each edge before framing.
    pub fn framing_pad(&self) -> usize {
        self.n_fft.saturating_sub(self.hop_size) / 2
    }

    /// Reject parameter sets that cannot describe a transform.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("n_fft", self.n_fft),
            ("num_mels", self.num_mels),
            ("hop_size", self.hop_size),
            ("win_size", self.win_size),
        ] {
            if value == 0 {
                return Err(invalid(name, "must be positive"));
            }
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if self.win_size > self.n_fft {
            return Err(invalid(
                "win_size",
                format!("{} exceeds n_fft {}", self.win_size, self.n_fft),
            ));
        }
        if self.hop_size > self.n_fft {
            return Err(invalid(
                "hop_size",
                format!(
                    "{} exceeds n_fft {}; the framing pad would be negative",
                    self.hop_size, self.n_fft
                ),
            ));
        }
        if !self.f_min.is_finite() || self.f_min < 0.0 {
            return Err(invalid("f_min", format!("{} is not a finite, non-negative frequency", self.f_min)));
        }
        if !self.f_max.is_finite() || self.f_max <= self.f_min {
            return Err(invalid(
                "f_max",
                format!("{} must be finite and above f_min {}", self.f_max, self.f_min),
            ));
        }
        if !self.clip_floor.is_finite() || self.clip_floor <= 0.0 {
            return Err(invalid("clip_floor", "must be finite and positive"));
        }
        if !self.compression_scale.is_finite() || self.compression_scale <= 0.0 {
            return Err(invalid("compression_scale", "must be finite and positive"));
        }
        Ok(())
    }

    /// Parse and validate a TOML table.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        parse_toml(text, Path::new(INLINE_SOURCE))
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        parse_toml(&text, path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|source| ConfigError::SerializeToml { source })
    }
}

fn parse_toml(text: &str, path: &Path) -> Result<TransformConfig, ConfigError> {
    let config: TransformConfig =
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: PathBuf::from(path),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_vocoder_feature_layout() {
        let config = TransformConfig::default();
        assert_eq!(config.n_fft, 1920);
        assert_eq!(config.num_mels, 80);
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.hop_size, 480);
        assert_eq!(config.win_size, 1920);
        assert_eq!(config.f_min, 0.0);
        assert_eq!(config.f_max, 8_000.0);
        assert!(!config.center);
        assert_eq!(config.freq_bins(), 961);
        assert_eq!(config.framing_pad(), 720);
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_overrides_named_fields_only() {
        let config = TransformConfig::from_toml_str(
            "f_max = 11025.0\nnum_mels = 100\ncompute_target = \"cuda:1\"\n",
        )
        .unwrap();
        assert_eq!(config.f_max, 11_025.0);
        assert_eq!(config.num_mels, 100);
        assert_eq!(config.n_fft, DEFAULT_N_FFT);
        assert_eq!(
            config.compute_target,
            ComputeTarget::Accelerator {
                kind: "cuda".into(),
                ordinal: 1
            }
        );
    }

    #[test]
    fn toml_output_parses_back() {
        let mut config = TransformConfig::default();
        config.compute_target = "metal".parse().unwrap();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("compute_target = \"metal:0\""));
        assert_eq!(TransformConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn load_reads_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mel.toml");
        std::fs::write(&path, "hop_size = 240\n").unwrap();
        let config = TransformConfig::load(&path).unwrap();
        assert_eq!(config.hop_size, 240);
        assert_eq!(config.framing_pad(), 840);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = TransformConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { path: p, .. } if p == path));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = TransformConfig::from_toml_str("n_fft = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn validate_rejects_inverted_frequency_range() {
        let config = TransformConfig {
            f_min: 8_000.0,
            f_max: 8_000.0,
            ..TransformConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "f_max", .. }));
    }

    #[test]
    fn validate_rejects_window_longer_than_fft() {
        let config = TransformConfig {
            win_size: 2048,
            ..TransformConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "win_size", .. }));
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let config = TransformConfig {
            hop_size: 0,
            ..TransformConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "hop_size", .. })
        ));
        let config = TransformConfig {
            sample_rate: 0,
            ..TransformConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "sample_rate", .. })
        ));
    }

    #[test]
    fn validate_rejects_hop_beyond_fft() {
        let config = TransformConfig {
            hop_size: 4096,
            ..TransformConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "hop_size", .. })
        ));
    }

    #[test]
    fn compute_target_parses_device_strings() {
        assert_eq!("CPU".parse::<ComputeTarget>().unwrap(), ComputeTarget::Cpu);
        let target: ComputeTarget = "cuda:3".parse().unwrap();
        assert_eq!(target.to_string(), "cuda:3");
        assert!("cuda:x".parse::<ComputeTarget>().is_err());
        assert!(":0".parse::<ComputeTarget>().is_err());
    }
}
