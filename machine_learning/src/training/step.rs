use crate::{Result, context::Context, dataset::Batch, models::Classifier};

/// Runs a full optimization step on a batch: clear, forward, loss, backward and step.
///
/// # Returns
/// The batch loss before the step.
pub fn fit_batch<M>(model: &mut M, ctx: &Context, batch: &Batch) -> Result<f32>
where
    M: Classifier + ?Sized,
{
    let ctx = ctx.with_grad();

    model.zero_grad();
    let logits = model.forward(&ctx, batch.x.view())?;
    let loss = model.loss(logits.view(), &batch.y)?;
    model.backward(&ctx, logits.view(), &batch.y)?;
    model.step()?;

    Ok(loss)
}

/// Computes the loss of a batch without tracking gradients.
pub fn batch_loss<M>(model: &mut M, ctx: &Context, batch: &Batch) -> Result<f32>
where
    M: Classifier + ?Sized,
{
    let logits = model.forward(&ctx.no_grad(), batch.x.view())?;
    model.loss(logits.view(), &batch.y)
}
