use crate::config::TransformConfig;
use crate::error::{ResourceError, try_zeroed};

/// Reflect-pad a signal by `(n_fft - hop_size) / 2` samples on each edge.
///
/// This replaces the transform's own centering so frame boundaries stay fixed
/// regardless of how the analyzer is configured.
pub fn pad(signal: &[f32], config: &TransformConfig) -> Result<Vec<f32>, ResourceError> {
    let pad = config.framing_pad();
    reflect_pad(signal, pad, pad)
}

/// Mirror a signal about its first and last samples, excluding the edge sample.
///
/// Pads longer than the signal keep bouncing between the edges. A single
/// sample is replicated and an empty signal pads with zeros.
pub fn reflect_pad(signal: &[f32], left: usize, right: usize) -> Result<Vec<f32>, ResourceError> {
    let total = left + signal.len() + right;
    let mut padded = try_zeroed::<f32>("padded waveform", total)?;
    match signal.len() {
        0 => {}
        1 => padded.fill(signal[0]),
        len => {
            for (i, slot) in padded.iter_mut().enumerate() {
                let idx = i as isize - left as isize;
                *slot = signal[reflect_index(idx, len)];
            }
        }
    }
    Ok(padded)
}

fn reflect_index(idx: isize, len: usize) -> usize {
    let period = 2 * (len as isize - 1);
    let folded = idx.rem_euclid(period);
    if folded >= len as isize {
        (period - folded) as usize
    } else {
        folded as usize
    }
}
