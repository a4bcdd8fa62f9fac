use log::info;
use serde::Serialize;

use crate::{
    MlErr, Result,
    context::Context,
    dataset::BatchSource,
    metrics::{self, ClassificationReport, ConfusionMatrix},
    models::Classifier,
};

/// The predictions of a model over a test set and the metrics computed from them.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    #[serde(skip)]
    pub y_true: Vec<usize>,
    #[serde(skip)]
    pub y_pred: Vec<usize>,
    pub accuracy: f32,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
}

/// Runs `predict` over every test batch and scores the concatenated predictions.
///
/// Only inference passes are made, so neither the parameters nor the batch normalization
/// statistics of the model change.
///
/// # Arguments
/// * `model` - The trained model.
/// * `ctx` - The execution context.
/// * `batches` - The test batches, reset before iterating.
///
/// # Returns
/// The evaluation, or an error if a batch yields a different amount of predictions than labels or
/// there were no samples.
pub fn evaluate<M, S>(model: &mut M, ctx: &Context, batches: &mut S) -> Result<Evaluation>
where
    M: Classifier + ?Sized,
    S: BatchSource + ?Sized,
{
    let ctx = ctx.no_grad();
    let mut y_true = Vec::new();
    let mut y_pred = Vec::new();

    batches.reset();
    while let Some(batch) = batches.next_batch()? {
        let pred = model.predict(&ctx, batch.x.view())?;
        if pred.len() != batch.y.len() {
            return Err(MlErr::SizeMismatch {
                what: "batch predictions",
                got: pred.len(),
                expected: batch.y.len(),
            });
        }

        y_true.extend(batch.y);
        y_pred.extend(pred);
    }

    if y_true.is_empty() {
        return Err(MlErr::EmptyBatches {
            what: "test samples",
        });
    }

    let accuracy = metrics::accuracy(&y_true, &y_pred)?;
    let confusion = ConfusionMatrix::new(model.num_classes(), &y_true, &y_pred)?;
    let report = ClassificationReport::new(&confusion);

    info!("evaluated {} samples, accuracy {accuracy:.4}", y_true.len());

    Ok(Evaluation {
        y_true,
        y_pred,
        accuracy,
        confusion,
        report,
    })
}
