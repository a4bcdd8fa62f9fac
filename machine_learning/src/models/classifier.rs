use ndarray::{Array2, ArrayView2, ArrayViewD, Ix2};

use crate::{
    MlErr, Result,
    arch::{
        Sequential,
        loss::{CrossEntropy, LossFn},
    },
    context::{Context, Device},
    optimization::Adam,
};

/// The state shared by every classifier: its layers and parameters, its loss, and its optimizer
/// together with the hyper parameters the optimizer is (re)created from.
#[derive(Debug, Clone)]
pub struct Network {
    seq: Sequential,
    loss_fn: CrossEntropy,
    optimizer: Option<Adam>,
    learning_rate: f32,
    weight_decay: f32,
    device: Device,
    num_classes: usize,
}

impl Network {
    /// Creates a new `Network` without an optimizer.
    ///
    /// # Arguments
    /// * `ctx` - The context the network is built for, it pins the network's device.
    /// * `seq` - The already initialized layers.
    /// * `num_classes` - The width of the last layer's output.
    /// * `learning_rate` - Adam's step size.
    /// * `weight_decay` - The L2 penalty coefficient.
    ///
    /// # Returns
    /// An error if any hyper parameter is out of range.
    pub fn new(
        ctx: &Context,
        seq: Sequential,
        num_classes: usize,
        learning_rate: f32,
        weight_decay: f32,
    ) -> Result<Self> {
        if num_classes == 0 {
            return Err(MlErr::InvalidConfig("there must be at least one class".into()));
        }

        if !learning_rate.is_finite() || learning_rate <= 0. {
            return Err(MlErr::InvalidConfig(format!(
                "the learning rate must be positive, got {learning_rate}"
            )));
        }

        if !weight_decay.is_finite() || weight_decay < 0. {
            return Err(MlErr::InvalidConfig(format!(
                "the weight decay can't be negative, got {weight_decay}"
            )));
        }

        Ok(Self {
            seq,
            loss_fn: CrossEntropy::new(),
            optimizer: None,
            learning_rate,
            weight_decay,
            device: ctx.device(),
            num_classes,
        })
    }

    pub fn sequential(&self) -> &Sequential {
        &self.seq
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }

    /// Returns the amount of learnable parameters.
    pub fn size(&self) -> usize {
        self.seq.size()
    }

    pub fn optimizer(&self) -> Option<&Adam> {
        self.optimizer.as_ref()
    }

    fn check_device(&self, ctx: &Context) -> Result<()> {
        if ctx.device() != self.device {
            return Err(MlErr::DeviceMismatch {
                model: self.device,
                context: ctx.device(),
            });
        }

        Ok(())
    }
}

/// The index of the largest value of every row, the first one wins on ties.
pub fn argmax_rows(logits: ArrayView2<f32>) -> Vec<usize> {
    logits
        .outer_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// A classification model trained with the usual clear, forward, loss, backward and step
/// sequence.
///
/// Implementors only expose their `Network`, every operation is provided on top of it.
pub trait Classifier {
    fn network(&self) -> &Network;

    fn network_mut(&mut self) -> &mut Network;

    fn num_classes(&self) -> usize {
        self.network().num_classes
    }

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `ctx` - The execution context, activations are only kept if it tracks gradients.
    /// * `x` - A batch of inputs, the first axis being the batch one.
    ///
    /// # Returns
    /// The logits of shape `(n, num_classes)`.
    fn forward(&mut self, ctx: &Context, x: ArrayViewD<f32>) -> Result<Array2<f32>> {
        let net = self.network_mut();
        net.check_device(ctx)?;

        let logits = net.seq.forward(ctx, x.to_owned())?.into_dimensionality::<Ix2>()?;
        if logits.ncols() != net.num_classes {
            return Err(MlErr::SizeMismatch {
                what: "logits width",
                got: logits.ncols(),
                expected: net.num_classes,
            });
        }

        Ok(logits)
    }

    /// Computes the mean cross entropy of a batch.
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<f32> {
        self.network().loss_fn.loss(logits, labels)
    }

    /// Predicts the class of every sample without tracking gradients.
    fn predict(&mut self, ctx: &Context, x: ArrayViewD<f32>) -> Result<Vec<usize>> {
        let logits = self.forward(&ctx.no_grad(), x)?;
        Ok(argmax_rows(logits.view()))
    }

    /// (Re)creates the optimizer bound to the current parameters, discarding any moments.
    fn configure_optimizer(&mut self) {
        let net = self.network_mut();
        net.optimizer = Some(Adam::new(
            net.seq.size(),
            net.learning_rate,
            net.weight_decay,
        ));
    }

    fn zero_grad(&mut self) {
        self.network_mut().seq.zero_grad();
    }

    /// Backpropagates the loss of the last gradient tracking forward pass, accumulating the
    /// gradient of every parameter.
    ///
    /// # Arguments
    /// * `ctx` - The execution context.
    /// * `logits` - The output of the last forward pass.
    /// * `labels` - The expected classes.
    fn backward(&mut self, ctx: &Context, logits: ArrayView2<f32>, labels: &[usize]) -> Result<()> {
        let net = self.network_mut();
        net.check_device(ctx)?;

        let d = net.loss_fn.loss_prime(logits, labels)?;
        net.seq.backward(ctx, d.into_dyn())?;
        Ok(())
    }

    /// Takes an optimizer step with the accumulated gradient.
    ///
    /// # Returns
    /// An error if the optimizer was never configured.
    fn step(&mut self) -> Result<()> {
        let net = self.network_mut();
        let optimizer = net
            .optimizer
            .as_mut()
            .ok_or(MlErr::OptimizerNotConfigured)?;

        net.seq.optimize(optimizer)
    }
}
