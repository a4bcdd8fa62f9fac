use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A loss over a batch of outputs and their integer class labels.
pub trait LossFn {
    /// Computes the mean loss of the batch.
    ///
    /// # Arguments
    /// * `y_pred` - The model's outputs, one row per sample.
    /// * `y` - The expected classes.
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32>;

    /// Computes the gradient of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>>;
}
