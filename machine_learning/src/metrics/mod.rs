mod confusion;
mod report;

pub use confusion::ConfusionMatrix;
pub use report::{ClassMetrics, ClassificationReport};

use crate::{MlErr, Result};

/// The fraction of predictions that match their expected class.
///
/// # Returns
/// An error if the sequences differ in length or are empty.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f32> {
    if y_true.len() != y_pred.len() {
        return Err(MlErr::SizeMismatch {
            what: "predictions",
            got: y_pred.len(),
            expected: y_true.len(),
        });
    }

    if y_true.is_empty() {
        return Err(MlErr::EmptyBatches {
            what: "predictions to score",
        });
    }

    let matches = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(matches as f32 / y_true.len() as f32)
}

/// Fails unless both sequences have the same length and only hold classes in `[0, num_classes)`.
fn check_pairs(num_classes: usize, y_true: &[usize], y_pred: &[usize]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(MlErr::SizeMismatch {
            what: "predictions",
            got: y_pred.len(),
            expected: y_true.len(),
        });
    }

    match y_true.iter().chain(y_pred).find(|&&c| c >= num_classes) {
        Some(&label) => Err(MlErr::LabelOutOfRange { label, num_classes }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_the_match_ratio() {
        assert_eq!(accuracy(&[0, 1, 2, 3], &[0, 1, 0, 0]).unwrap(), 0.5);
        assert!(accuracy(&[], &[]).is_err());
        assert!(accuracy(&[1], &[1, 2]).is_err());
    }
}
