use std::borrow::Cow;

use ndarray::{
    Array1, ArrayBase, ArrayView1, ArrayView2, ArrayViewD, Axis, CowArray, Data, Ix1, Ix2, IxDyn,
};

use crate::error::ShapeError;

/// Batch of real-valued signals sharing one set of transform parameters.
///
/// Always stored as `[batch, samples]`; a single signal becomes a batch of one.
#[derive(Clone, Debug)]
pub struct Waveform<'a> {
    samples: CowArray<'a, f32, Ix2>,
}

impl<'a> Waveform<'a> {
    pub fn mono(samples: &'a [f32]) -> Self {
        Self {
            samples: CowArray::from(ArrayView1::from(samples).insert_axis(Axis(0))),
        }
    }

    pub fn batch(samples: ArrayView2<'a, f32>) -> Result<Self, ShapeError> {
        ensure_non_empty(samples.nrows())?;
        Ok(Self {
            samples: CowArray::from(samples),
        })
    }

    /// Accept `[samples]` or `[batch, samples]`; any other rank is rejected.
    pub fn from_dyn(samples: ArrayViewD<'a, f32>) -> Result<Self, ShapeError> {
        let samples = to_batch(samples)?;
        ensure_non_empty(samples.nrows())?;
        Ok(Self {
            samples: CowArray::from(samples),
        })
    }

    /// Narrow double-precision input to `f32`.
    pub fn from_f64(samples: ArrayViewD<'_, f64>) -> Result<Waveform<'static>, ShapeError> {
        let narrowed = to_batch(samples.mapv(|x| x as f32))?;
        ensure_non_empty(narrowed.nrows())?;
        Ok(Waveform {
            samples: CowArray::from(narrowed),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.samples.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.ncols()
    }

    /// Contiguous samples of one signal, copied only if the row is strided.
    pub fn signal(&self, index: usize) -> Cow<'_, [f32]> {
        let row = self.samples.row(index);
        match row.to_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(row.to_vec()),
        }
    }

    /// Smallest and largest sample over the whole batch, `None` when empty.
    pub fn amplitude_range(&self) -> Option<(f32, f32)> {
        if self.samples.is_empty() {
            return None;
        }
        let range = self
            .samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        Some(range)
    }
}

impl<'a> From<&'a [f32]> for Waveform<'a> {
    fn from(samples: &'a [f32]) -> Self {
        Waveform::mono(samples)
    }
}

impl From<Array1<f32>> for Waveform<'static> {
    fn from(samples: Array1<f32>) -> Self {
        Waveform {
            samples: CowArray::from(samples.insert_axis(Axis(0))),
        }
    }
}

fn to_batch<S>(samples: ArrayBase<S, IxDyn>) -> Result<ArrayBase<S, Ix2>, ShapeError>
where
    S: Data,
{
    match samples.ndim() {
        1 => Ok(samples.into_dimensionality::<Ix1>()?.insert_axis(Axis(0))),
        2 => Ok(samples.into_dimensionality::<Ix2>()?),
        rank => Err(ShapeError::Rank { rank }),
    }
}

fn ensure_non_empty(batch: usize) -> Result<(), ShapeError> {
    if batch == 0 {
        return Err(ShapeError::EmptyBatch);
    }
    Ok(())
}
