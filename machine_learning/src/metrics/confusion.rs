use std::fmt::{self, Display};

use ndarray::{Array2, ArrayView2, Axis};
use serde::Serialize;

use super::check_pairs;
use crate::Result;

/// A confusion matrix: `counts[[t, p]]` is the amount of samples of class `t` predicted as `p`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Creates a new `ConfusionMatrix`.
    ///
    /// # Arguments
    /// * `num_classes` - The amount of classes, every class gets a row and a column.
    /// * `y_true` - The expected classes.
    /// * `y_pred` - The predicted classes.
    ///
    /// # Returns
    /// An error if the sequences differ in length or contain a class out of range.
    pub fn new(num_classes: usize, y_true: &[usize], y_pred: &[usize]) -> Result<Self> {
        check_pairs(num_classes, y_true, y_pred)?;

        let mut counts = Array2::zeros((num_classes, num_classes));
        for (&t, &p) in y_true.iter().zip(y_pred) {
            counts[[t, p]] += 1;
        }

        Ok(Self {
            num_classes,
            counts,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn counts(&self) -> ArrayView2<'_, usize> {
        self.counts.view()
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// The amount of correctly classified samples.
    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// The amount of samples of each true class.
    pub fn support(&self) -> Vec<usize> {
        self.counts.sum_axis(Axis(1)).to_vec()
    }

    /// The amount of samples predicted as each class.
    pub fn predicted(&self) -> Vec<usize> {
        self.counts.sum_axis(Axis(0)).to_vec()
    }
}

impl Display for ConfusionMatrix {
    /// Prints the matrix the way numpy prints integer arrays.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .map(|count| count.to_string().len())
            .max()
            .unwrap_or(1);

        write!(f, "[")?;
        for (i, row) in self.counts.outer_iter().enumerate() {
            if i > 0 {
                write!(f, "\n ")?;
            }

            let cells: Vec<_> = row.iter().map(|c| format!("{c:>width$}")).collect();
            write!(f, "[{}]", cells.join(" "))?;
        }
        write!(f, "]")
    }
}
