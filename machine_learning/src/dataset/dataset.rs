use ndarray::{ArrayD, IxDyn};

use crate::{MlErr, Result};

/// An in-memory labelled dataset of fixed shape samples.
///
/// The samples are stored contiguously, sample `i` spans `xs[i * sample_len..(i + 1) * sample_len]`.
#[derive(Debug, Clone)]
pub struct Dataset {
    sample_shape: Vec<usize>,
    sample_len: usize,
    xs: Vec<f32>,
    ys: Vec<usize>,
}

impl Dataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Arguments
    /// * `sample_shape` - The shape of a single sample, e.g. `[3, 32, 32]`.
    /// * `xs` - The samples, laid out contiguously.
    /// * `ys` - One label per sample.
    ///
    /// # Returns
    /// An error if the sample shape is empty or the buffers' lengths disagree.
    pub fn new(sample_shape: Vec<usize>, xs: Vec<f32>, ys: Vec<usize>) -> Result<Self> {
        let sample_len: usize = sample_shape.iter().product();
        if sample_shape.is_empty() || sample_len == 0 {
            return Err(MlErr::InvalidConfig(format!(
                "a sample shape of {sample_shape:?} holds no values"
            )));
        }

        if xs.len() != ys.len() * sample_len {
            return Err(MlErr::SizeMismatch {
                what: "dataset samples",
                got: xs.len(),
                expected: ys.len() * sample_len,
            });
        }

        Ok(Self {
            sample_shape,
            sample_len,
            xs,
            ys,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ys.is_empty()
    }

    #[inline]
    pub fn sample_shape(&self) -> &[usize] {
        &self.sample_shape
    }

    #[inline]
    pub fn ys(&self) -> &[usize] {
        &self.ys
    }

    /// Returns the sample at `idx` and its label, or `None` if out of bounds.
    pub fn get(&self, idx: usize) -> Option<(&[f32], usize)> {
        let &y = self.ys.get(idx)?;
        let start = idx * self.sample_len;
        Some((&self.xs[start..start + self.sample_len], y))
    }

    /// Copies the given samples, in order, into a batch.
    ///
    /// # Arguments
    /// * `indices` - The indices of the samples to gather.
    ///
    /// # Returns
    /// A batch of shape `(indices.len(), ...sample_shape)` or an error if an index is out of
    /// bounds.
    pub fn gather(&self, indices: &[usize]) -> Result<Batch> {
        let mut xs = Vec::with_capacity(indices.len() * self.sample_len);
        let mut ys = Vec::with_capacity(indices.len());

        for &idx in indices {
            let (x, y) = self.get(idx).ok_or(MlErr::SizeMismatch {
                what: "dataset index",
                got: idx,
                expected: self.len(),
            })?;

            xs.extend_from_slice(x);
            ys.push(y);
        }

        let mut shape = vec![indices.len()];
        shape.extend_from_slice(&self.sample_shape);
        Batch::new(ArrayD::from_shape_vec(IxDyn(&shape), xs)?, ys)
    }
}

/// An owned batch of samples and their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: ArrayD<f32>,
    pub y: Vec<usize>,
}

impl Batch {
    /// Creates a new `Batch`.
    ///
    /// # Returns
    /// An error if the batch dimension of `x` doesn't match the amount of labels.
    pub fn new(x: ArrayD<f32>, y: Vec<usize>) -> Result<Self> {
        let n = x.shape().first().copied().unwrap_or_default();
        if n != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "batch labels",
                got: y.len(),
                expected: n,
            });
        }

        Ok(Self { x, y })
    }

    /// A batch of `n` zeroed samples, all labelled as class 0.
    pub fn zeros(n: usize, sample_shape: &[usize]) -> Self {
        let mut shape = vec![n];
        shape.extend_from_slice(sample_shape);

        Self {
            x: ArrayD::zeros(IxDyn(&shape)),
            y: vec![0; n],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let xs = (0..12).map(|i| i as f32).collect();
        Dataset::new(vec![2, 2], xs, vec![7, 8, 9]).unwrap()
    }

    #[test]
    fn rejects_inconsistent_buffers() {
        let err = Dataset::new(vec![2, 2], vec![0.; 11], vec![0, 1, 2]);
        assert!(matches!(
            err,
            Err(MlErr::SizeMismatch {
                got: 11,
                expected: 12,
                ..
            })
        ));

        assert!(Dataset::new(vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn gather_keeps_the_requested_order() {
        let batch = dataset().gather(&[2, 0]).unwrap();

        assert_eq!(batch.x.shape(), &[2, 2, 2]);
        assert_eq!(
            batch.x.as_slice().unwrap(),
            &[8., 9., 10., 11., 0., 1., 2., 3.]
        );
        assert_eq!(batch.y, [9, 7]);
    }

    #[test]
    fn gather_out_of_bounds() {
        assert!(dataset().gather(&[0, 3]).is_err());
    }

    #[test]
    fn batch_checks_labels() {
        assert!(Batch::new(ArrayD::zeros(IxDyn(&[2, 3])), vec![1]).is_err());
        assert_eq!(Batch::zeros(4, &[3, 2]).x.shape(), &[4, 3, 2]);
    }
}
