use ndarray::{ArrayBase, DataMut, Dimension};

use crate::config::{DEFAULT_CLIP_FLOOR, DEFAULT_COMPRESSION_SCALE};

/// Log dynamic-range compression in place: `ln(max(x, clip_floor) * scale)`.
///
/// The floor is applied before scaling so `ln(0)` can never occur.
pub fn compress<S, D>(energies: &mut ArrayBase<S, D>, clip_floor: f32, scale: f32)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    energies.mapv_inplace(|x| (x.max(clip_floor) * scale).ln());
}

/// [`compress`] with the vocoder's default floor and unit scale.
pub fn spectral_normalize<S, D>(energies: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    compress(energies, DEFAULT_CLIP_FLOOR, DEFAULT_COMPRESSION_SCALE);
}
