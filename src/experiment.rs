use std::{num::NonZeroUsize, sync::Arc};

use anyhow::{anyhow, ensure, Context as _, Result};
use log::info;
use machine_learning::{
    dataset::{random_split, Batch, BatchSource, DataLoader},
    evaluation::evaluate,
    metrics,
    models::{Classifier, ConvNet, FullyConnected, FullyConnectedConfig},
    training::{train, train_small},
    Context,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    cifar::{self, CLASSES, IMAGE_SHAPE},
    config::{Args, ModelKind},
    summary::{SanityCheck, Summary},
};

/// Builds the model selected by `args`, with a configured optimizer.
pub fn build_model(args: &Args, ctx: &Context, rng: &mut StdRng) -> Result<Box<dyn Classifier>> {
    let model: Box<dyn Classifier> = match args.model {
        ModelKind::Fc => {
            let config = FullyConnectedConfig {
                input_size: IMAGE_SHAPE.iter().product(),
                hidden: (args.hidden1, args.hidden2),
                num_classes: CLASSES.len(),
                learning_rate: args.learning_rate,
                weight_decay: args.weight_decay,
            };
            Box::new(FullyConnected::new(ctx, config, rng)?)
        }
        ModelKind::Conv => Box::new(ConvNet::new(
            ctx,
            args.learning_rate,
            args.weight_decay,
            rng,
        )?),
    };

    Ok(model)
}

/// Feeds a zeroed batch through the model and checks the logits' shape.
fn check_shape(model: &mut dyn Classifier, ctx: &Context, batch_size: usize) -> Result<()> {
    let batch = Batch::zeros(batch_size, &IMAGE_SHAPE);
    let logits = model.forward(&ctx.no_grad(), batch.x.view())?;

    ensure!(
        logits.dim() == (batch_size, CLASSES.len()),
        "expected logits of shape {:?}, got {:?}",
        (batch_size, CLASSES.len()),
        logits.dim()
    );

    info!("logits shape {:?}", logits.shape());
    Ok(())
}

/// Fits a fresh model to the first training batch and reports how well it memorized it.
fn sanity_check<T, V>(
    args: &Args,
    ctx: &Context,
    rng: &mut StdRng,
    train_loader: &mut T,
    val_loader: &mut V,
) -> Result<SanityCheck>
where
    T: BatchSource,
    V: BatchSource,
{
    train_loader.reset();
    val_loader.reset();
    let train_batch = train_loader
        .next_batch()?
        .ok_or_else(|| anyhow!("there are no training batches"))?;
    let val_batch = val_loader
        .next_batch()?
        .ok_or_else(|| anyhow!("there are no validation batches"))?;

    let mut model = build_model(args, ctx, rng)?;
    let history = train_small(&mut *model, ctx, &train_batch, &val_batch, args.overfit_iters)?;

    let pred = model.predict(ctx, train_batch.x.view())?;
    let train_accuracy = metrics::accuracy(&train_batch.y, &pred)?;
    info!("sanity check training accuracy {train_accuracy:.4}");

    Ok(SanityCheck {
        history,
        train_accuracy,
    })
}

/// Runs the whole experiment: data loading, shape check, single batch sanity check, full
/// training and evaluation on the test set.
///
/// The confusion matrix and the classification report are printed to stdout.
pub fn run(args: &Args) -> Result<Summary> {
    args.validate()?;

    let device = args.device();
    let ctx = Context::new(device);
    let mut rng = StdRng::seed_from_u64(args.seed);
    info!("using device {device}");

    let train_set = Arc::new(cifar::load_train(&args.data_dir)?);
    let test_set = Arc::new(cifar::load_test(&args.data_dir)?);

    let [train_idx, val_idx]: [Vec<usize>; 2] = random_split(
        train_set.len(),
        &[1. - args.val_fraction, args.val_fraction],
        &mut rng,
    )?
    .try_into()
    .map_err(|_| anyhow!("expected a two way split"))?;

    let batch_size = NonZeroUsize::new(args.batch_size).context("the batch size must be positive")?;
    let mut train_loader =
        DataLoader::with_indices(Arc::clone(&train_set), train_idx, batch_size)?.shuffled(args.seed);
    let mut val_loader =
        DataLoader::with_indices(train_set, val_idx, batch_size)?.shuffled(args.seed.wrapping_add(1));
    let mut test_loader = DataLoader::new(test_set, batch_size);

    info!(
        train = train_loader.num_batches(),
        val = val_loader.num_batches(),
        test = test_loader.num_batches();
        "batches per pass"
    );

    let mut model = build_model(args, &ctx, &mut rng)?;
    let parameters = model.network().size();
    info!("{:?} model with {parameters} parameters", args.model);
    check_shape(&mut *model, &ctx, args.batch_size)?;

    let sanity_check = if args.overfit_iters > 0 {
        Some(sanity_check(
            args,
            &ctx,
            &mut rng,
            &mut train_loader,
            &mut val_loader,
        )?)
    } else {
        None
    };

    let history = train(
        &mut *model,
        &ctx,
        &mut train_loader,
        &mut val_loader,
        args.epochs,
    )?;

    let mut evaluation = evaluate(&mut *model, &ctx, &mut test_loader)?;
    evaluation.report = evaluation.report.with_target_names(&CLASSES)?;

    println!("accuracy: {:.4}\n", evaluation.accuracy);
    println!("{}\n", evaluation.confusion);
    println!("{}", evaluation.report);

    Ok(Summary {
        model: args.model,
        device,
        parameters,
        sanity_check,
        history,
        evaluation,
    })
}
