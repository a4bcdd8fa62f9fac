use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax cross entropy, taking raw logits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    fn validate(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<()> {
        if y_pred.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        if y.is_empty() {
            return Err(MlErr::EmptyBatches {
                what: "samples to compute a loss over",
            });
        }

        let num_classes = y_pred.ncols();
        match y.iter().find(|&&label| label >= num_classes) {
            Some(&label) => Err(MlErr::LabelOutOfRange { label, num_classes }),
            None => Ok(()),
        }
    }
}

/// `log(sum(exp(z)))` shifted by the maximum for stability.
fn log_sum_exp(z: ArrayView1<f32>) -> f32 {
    let max = z.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    max + z.fold(0., |acc, &v| acc + (v - max).exp()).ln()
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32> {
        self.validate(y_pred, y)?;

        let total: f32 = y_pred
            .outer_iter()
            .zip(y)
            .map(|(z, &label)| log_sum_exp(z) - z[label])
            .sum();

        Ok(total / y.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>> {
        self.validate(y_pred, y)?;

        let n = y.len() as f32;
        let mut d = y_pred.to_owned();

        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(y) {
            let lse = log_sum_exp(row.view());
            row.mapv_inplace(|z| (z - lse).exp() / n);
            row[label] -= 1. / n;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_logits() {
        let logits = Array2::zeros((4, 10));
        let loss = CrossEntropy.loss(logits.view(), &[0, 3, 9, 5]).unwrap();

        assert!((loss - 10f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn confident_and_correct_is_near_zero() {
        let logits = array![[50., 0., 0.], [0., 0., 50.]];
        let loss = CrossEntropy.loss(logits.view(), &[0, 2]).unwrap();

        assert!(loss >= 0.);
        assert!(loss < 1e-6);
    }

    #[test]
    fn large_logits_stay_finite() {
        let logits = array![[1000., -1000.], [-1000., 1000.]];
        let loss = CrossEntropy.loss(logits.view(), &[1, 0]).unwrap();

        assert!((loss - 2000.).abs() < 1e-2);
    }

    #[test]
    fn gradient_is_softmax_minus_one_hot() {
        let logits = array![[0., 0.], [2f32.ln(), 0.]];
        let d = CrossEntropy.loss_prime(logits.view(), &[0, 1]).unwrap();

        // Softmaxes are [1/2, 1/2] and [2/3, 1/3], divided by the batch size.
        let expected = array![[-0.25, 0.25], [1. / 3., -1. / 3.]];
        d.iter()
            .zip(&expected)
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-6));
        d.sum_axis(Axis(1))
            .iter()
            .for_each(|s| assert!(s.abs() < 1e-6));
    }

    #[test]
    fn label_errors() {
        let logits = Array2::zeros((2, 3));

        let err = CrossEntropy.loss(logits.view(), &[0, 3]);
        assert!(matches!(
            err,
            Err(MlErr::LabelOutOfRange {
                label: 3,
                num_classes: 3
            })
        ));

        let err = CrossEntropy.loss_prime(logits.view(), &[0]);
        assert!(matches!(
            err,
            Err(MlErr::SizeMismatch {
                got: 1,
                expected: 2,
                ..
            })
        ));
    }
}
