use ndarray::ArrayD;

use super::{BatchNorm2d, Conv2d, ConvSpec, Dense, Flatten, MaxPool2d};
use crate::{
    Result,
    arch::{activations::ActFn, initialization::ParamGen},
    context::Context,
};

/// A layer of a sequential model.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    BatchNorm2d(BatchNorm2d),
    Flatten(Flatten),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn conv2d(spec: ConvSpec, act_fn: Option<ActFn>) -> Self {
        Self::Conv2d(Conv2d::new(spec, act_fn))
    }

    pub fn max_pool2d(kernel: usize) -> Self {
        Self::MaxPool2d(MaxPool2d::new(kernel))
    }

    pub fn batch_norm2d(channels: usize) -> Self {
        Self::BatchNorm2d(BatchNorm2d::new(channels))
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of learnable parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Layer::Dense(l) => l.size(),
            Layer::Conv2d(l) => l.size(),
            Layer::BatchNorm2d(l) => l.size(),
            Layer::MaxPool2d(_) | Layer::Flatten(_) => 0,
        }
    }

    /// The parameter generators of this layer's default initialization, covering exactly `size`
    /// parameters.
    pub fn param_gens(&self) -> Result<Vec<Box<dyn ParamGen>>> {
        match self {
            Layer::Dense(l) => l.param_gens(),
            Layer::Conv2d(l) => l.param_gens(),
            Layer::BatchNorm2d(l) => l.param_gens(),
            Layer::MaxPool2d(_) | Layer::Flatten(_) => Ok(Vec::new()),
        }
    }

    pub fn forward(&mut self, ctx: &Context, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Layer::Dense(l) => l.forward(ctx, params, x),
            Layer::Conv2d(l) => l.forward(ctx, params, x),
            Layer::MaxPool2d(l) => l.forward(ctx, x),
            Layer::BatchNorm2d(l) => l.forward(ctx, params, x),
            Layer::Flatten(l) => l.forward(ctx, x),
        }
    }

    pub fn backward(
        &mut self,
        ctx: &Context,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        match self {
            Layer::Dense(l) => l.backward(params, grad, d),
            Layer::Conv2d(l) => l.backward(ctx, params, grad, d),
            Layer::MaxPool2d(l) => l.backward(ctx, d),
            Layer::BatchNorm2d(l) => l.backward(params, grad, d),
            Layer::Flatten(l) => l.backward(d),
        }
    }
}
