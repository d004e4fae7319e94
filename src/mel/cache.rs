//! Memoized filterbanks and analysis windows.
//!
//! Both tables are pure functions of a small key, so a miss builds outside the
//! lock and publishes with `entry().or_insert`. Two threads racing on the same
//! key build identical tables; whichever lands first is kept and every caller
//! receives that one. Entries are never mutated or evicted once visible.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::{ComputeTarget, TransformConfig};
use crate::error::MelError;

use super::filterbank::FilterBank;
use super::window::AnalysisWindow;

static GLOBAL_CACHE: LazyLock<AnalysisCache> = LazyLock::new(AnalysisCache::new);

/// Everything that determines a filterbank, plus where it is meant to live.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterBankKey {
    pub n_fft: usize,
    pub num_mels: usize,
    pub sample_rate: u32,
    f_min_bits: u32,
    f_max_bits: u32,
    pub target: ComputeTarget,
}

impl FilterBankKey {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            n_fft: config.n_fft,
            num_mels: config.num_mels,
            sample_rate: config.sample_rate,
            f_min_bits: frequency_bits(config.f_min),
            f_max_bits: frequency_bits(config.f_max),
            target: config.compute_target.clone(),
        }
    }

    pub fn f_min(&self) -> f32 {
        f32::from_bits(self.f_min_bits)
    }

    pub fn f_max(&self) -> f32 {
        f32::from_bits(self.f_max_bits)
    }
}

/// Window length plus target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub win_size: usize,
    pub target: ComputeTarget,
}

impl WindowKey {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            win_size: config.win_size,
            target: config.compute_target.clone(),
        }
    }
}

/// Thread-safe, unbounded store of filterbanks and windows.
///
/// Use [`AnalysisCache::global`] for a process-wide instance or create one per
/// owner (tests typically build a fresh cache per case).
#[derive(Debug, Default)]
pub struct AnalysisCache {
    filter_banks: Mutex<HashMap<FilterBankKey, Arc<FilterBank>>>,
    windows: Mutex<HashMap<WindowKey, Arc<AnalysisWindow>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by [`crate::extract_mel_spectrogram`].
    pub fn global() -> &'static AnalysisCache {
        &GLOBAL_CACHE
    }

    /// Filterbank for `config`, built on first use. Invalid configs are
    /// rejected without touching the cache.
    pub fn filter_bank(&self, config: &TransformConfig) -> Result<Arc<FilterBank>, MelError> {
        config.validate()?;
        let key = FilterBankKey::from_config(config);
        get_or_build(&self.filter_banks, key, |key| {
            debug!(
                n_fft = key.n_fft,
                num_mels = key.num_mels,
                sample_rate = key.sample_rate,
                f_min = key.f_min(),
                f_max = key.f_max(),
                target = %key.target,
                "Building mel filterbank"
            );
            FilterBank::new(config)
        })
    }

    pub fn window(&self, config: &TransformConfig) -> Result<Arc<AnalysisWindow>, MelError> {
        config.validate()?;
        let key = WindowKey::from_config(config);
        get_or_build(&self.windows, key, |key| {
            debug!(win_size = key.win_size, target = %key.target, "Building Hann window");
            Ok(AnalysisWindow::hann(key.win_size)?)
        })
    }

    pub fn filter_bank_count(&self) -> usize {
        lock(&self.filter_banks).len()
    }

    pub fn window_count(&self) -> usize {
        lock(&self.windows).len()
    }
}

fn get_or_build<K, V, F>(
    map: &Mutex<HashMap<K, Arc<V>>>,
    key: K,
    build: F,
) -> Result<Arc<V>, MelError>
where
    K: Eq + Hash,
    F: FnOnce(&K) -> Result<V, MelError>,
{
    if let Some(hit) = lock(map).get(&key) {
        return Ok(Arc::clone(hit));
    }
    let built = Arc::new(build(&key)?);
    let mut guard = lock(map);
    Ok(Arc::clone(guard.entry(key).or_insert(built)))
}

// Values are immutable Arcs inserted whole, so a poisoned map is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn frequency_bits(hz: f32) -> u32 {
    // fold -0.0 into 0.0
    (hz + 0.0).to_bits()
}
