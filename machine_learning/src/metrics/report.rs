use std::fmt::{self, Display};

use serde::Serialize;

use super::ConfusionMatrix;
use crate::{MlErr, Result};

/// Precision, recall, F1 score and support of a single class or an average of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// A per class summary of a classifier's performance, with the accuracy and the macro and
/// support weighted averages. Every ratio with a zero denominator is reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    target_names: Vec<String>,
    classes: Vec<ClassMetrics>,
    accuracy: f32,
    macro_avg: ClassMetrics,
    weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 { 0. } else { num as f32 / den as f32 }
}

fn f1(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0. {
        0.
    } else {
        2. * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    /// Builds the report of a confusion matrix, naming every class after its index.
    pub fn new(confusion: &ConfusionMatrix) -> Self {
        let counts = confusion.counts();
        let support = confusion.support();
        let predicted = confusion.predicted();
        let total = confusion.total();

        let classes: Vec<_> = (0..confusion.num_classes())
            .map(|c| {
                let tp = counts[[c, c]];
                let precision = ratio(tp, predicted[c]);
                let recall = ratio(tp, support[c]);

                ClassMetrics {
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support: support[c],
                }
            })
            .collect();

        let average = |weight: &dyn Fn(&ClassMetrics) -> f32, norm: f32| {
            let mean = |metric: fn(&ClassMetrics) -> f32| {
                if norm == 0. {
                    return 0.;
                }
                classes.iter().map(|m| metric(m) * weight(m)).sum::<f32>() / norm
            };

            ClassMetrics {
                precision: mean(|m| m.precision),
                recall: mean(|m| m.recall),
                f1: mean(|m| m.f1),
                support: total,
            }
        };

        let macro_avg = average(&|_| 1., classes.len() as f32);
        let weighted_avg = average(&|m| m.support as f32, total as f32);

        Self {
            target_names: (0..classes.len()).map(|c| c.to_string()).collect(),
            accuracy: ratio(confusion.correct(), total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Replaces the class indices with human readable names.
    ///
    /// # Returns
    /// An error if there isn't exactly one name per class.
    pub fn with_target_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        if names.len() != self.classes.len() {
            return Err(MlErr::SizeMismatch {
                what: "target names",
                got: names.len(),
                expected: self.classes.len(),
            });
        }

        self.target_names = names.iter().map(|name| name.as_ref().to_string()).collect();
        Ok(self)
    }

    pub fn classes(&self) -> &[ClassMetrics] {
        &self.classes
    }

    pub fn accuracy(&self) -> f32 {
        self.accuracy
    }

    pub fn macro_avg(&self) -> ClassMetrics {
        self.macro_avg
    }

    pub fn weighted_avg(&self) -> ClassMetrics {
        self.weighted_avg
    }
}

impl Display for ClassificationReport {
    /// Renders the report with two decimals, in the layout of scikit-learn's
    /// `classification_report`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WEIGHTED_AVG: &str = "weighted avg";

        let width = self
            .target_names
            .iter()
            .map(|name| name.len())
            .chain([WEIGHTED_AVG.len()])
            .max()
            .unwrap_or_default();

        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{name:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.precision, m.recall, m.f1, m.support
            )
        };

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;

        for (name, m) in self.target_names.iter().zip(&self.classes) {
            row(f, name, m)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, WEIGHTED_AVG, &self.weighted_avg)
    }
}
