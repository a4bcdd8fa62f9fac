use log::{debug, info};

use super::{
    LossHistory,
    step::{batch_loss, fit_batch},
};
use crate::{Result, context::Context, dataset::Batch, models::Classifier};

/// Repeatedly fits a single training batch, a sanity check that the model is able to overfit.
///
/// After every step the loss of the validation batch is computed, without tracking gradients, with
/// the updated parameters. The model is mutated in place.
///
/// # Arguments
/// * `model` - The model to train.
/// * `ctx` - The execution context.
/// * `train` - The batch to fit.
/// * `val` - The batch to monitor.
/// * `iterations` - The amount of optimization steps.
///
/// # Returns
/// `iterations` training and validation losses.
pub fn train_small<M>(
    model: &mut M,
    ctx: &Context,
    train: &Batch,
    val: &Batch,
    iterations: usize,
) -> Result<LossHistory>
where
    M: Classifier + ?Sized,
{
    let mut history = LossHistory::with_capacity(iterations);

    for i in 0..iterations {
        let train_loss = fit_batch(model, ctx, train)?;
        let val_loss = batch_loss(model, ctx, val)?;

        debug!(iteration = i, train_loss = train_loss, val_loss = val_loss; "small batch step");
        history.push(train_loss, val_loss);
    }

    if let Some((train_loss, val_loss)) = history.last() {
        info!(
            "fitted {} samples for {iterations} iterations, train loss {train_loss:.4}, val loss {val_loss:.4}",
            train.len()
        );
    }

    Ok(history)
}
