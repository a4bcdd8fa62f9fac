use log::{debug, info};

use super::{
    LossHistory,
    step::{batch_loss, fit_batch},
};
use crate::{MlErr, Result, context::Context, dataset::BatchSource, models::Classifier};

/// Trains a model over full passes of the training batches.
///
/// Every epoch both sources are reset, every training batch is fitted once and then every
/// validation batch is scored without tracking gradients. The recorded losses are the means over
/// each pass' batches.
///
/// # Arguments
/// * `model` - The model to train.
/// * `ctx` - The execution context.
/// * `train` - The training batches.
/// * `val` - The validation batches.
/// * `epochs` - The amount of passes over the training batches.
///
/// # Returns
/// One training and one validation loss per epoch, or an error if a source yields no batches.
pub fn train<M, T, V>(
    model: &mut M,
    ctx: &Context,
    train: &mut T,
    val: &mut V,
    epochs: usize,
) -> Result<LossHistory>
where
    M: Classifier + ?Sized,
    T: BatchSource + ?Sized,
    V: BatchSource + ?Sized,
{
    let mut history = LossHistory::with_capacity(epochs);

    for epoch in 0..epochs {
        train.reset();
        let mut total = 0.;
        let mut num_batches = 0;

        while let Some(batch) = train.next_batch()? {
            let loss = fit_batch(model, ctx, &batch)?;
            debug!(epoch = epoch, batch = num_batches, loss = loss; "train batch");

            total += loss;
            num_batches += 1;
        }

        let train_loss = mean(total, num_batches, "training batches")?;

        val.reset();
        let mut total = 0.;
        let mut num_batches = 0;

        while let Some(batch) = val.next_batch()? {
            total += batch_loss(model, ctx, &batch)?;
            num_batches += 1;
        }

        let val_loss = mean(total, num_batches, "validation batches")?;

        info!("epoch {epoch}: train loss {train_loss:.4}, val loss {val_loss:.4}");
        history.push(train_loss, val_loss);
    }

    Ok(history)
}

fn mean(total: f32, count: usize, what: &'static str) -> Result<f32> {
    if count == 0 {
        return Err(MlErr::EmptyBatches { what });
    }

    Ok(total / count as f32)
}
