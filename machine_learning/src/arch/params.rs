use std::mem;

use rand::RngCore;
use rayon::prelude::*;

use super::initialization::ParamGen;
use crate::{MlErr, Result, optimization::Optimizer};

/// The learnable parameters of a model and their gradient, both stored as a single flat vector
/// that is partitioned by layer.
///
/// Layers never own their parameters, they receive their own slices while the model's layers are
/// traversed forwards (`front`) or backwards (`back`).
#[derive(Debug, Clone)]
pub struct ParamStore {
    params: Vec<f32>,
    grad: Vec<f32>,
    layer_sizes: Vec<usize>,
}

impl ParamStore {
    /// Creates a new zeroed `ParamStore`.
    ///
    /// # Arguments
    /// * `layer_sizes` - The amount of parameters of each layer, in order.
    ///
    /// # Returns
    /// A new `ParamStore` instance.
    pub fn new(layer_sizes: Vec<usize>) -> Self {
        let len = layer_sizes.iter().sum();

        Self {
            params: vec![0.; len],
            grad: vec![0.; len],
            layer_sizes,
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Creates a new `FrontIter` parameter iterator.
    ///
    /// The returned iterator iterates the model's layers forward.
    pub fn front(&self) -> FrontIter<'_> {
        FrontIter {
            params: &self.params,
            layer_sizes: &self.layer_sizes,
        }
    }

    /// Creates a new `BackIter` parameter iterator.
    ///
    /// The returned iterator iterates the model's layers backwards.
    pub fn back(&mut self) -> BackIter<'_> {
        BackIter {
            params: &self.params,
            grad: &mut self.grad,
            layer_sizes: &self.layer_sizes,
        }
    }

    /// Zeros out the gradient.
    pub fn zero_grad(&mut self) {
        self.grad.par_iter_mut().for_each(|g| *g = 0.);
    }

    /// Applies the gradient onto the parameters.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer bound to these parameters.
    ///
    /// # Returns
    /// An error if the optimizer was created for a different amount of parameters.
    pub fn optimize<O: Optimizer>(&mut self, optimizer: &mut O) -> Result<()> {
        if optimizer.size() != self.len() {
            return Err(MlErr::SizeMismatch {
                what: "optimizer state",
                got: optimizer.size(),
                expected: self.len(),
            });
        }

        optimizer.update_params(&mut self.params, &self.grad);
        Ok(())
    }

    /// Overwrites every parameter with values sampled from `param_gen`.
    ///
    /// # Arguments
    /// * `param_gen` - The parameter generator, it must be able to generate exactly `len` values.
    /// * `rng` - The random number generator.
    ///
    /// # Returns
    /// An error if the generator doesn't yield as many parameters as this store holds.
    pub fn init(&mut self, param_gen: &mut dyn ParamGen, rng: &mut dyn RngCore) -> Result<()> {
        let expected = self.len();
        let sample = param_gen.sample(rng, expected).unwrap_or_default();

        if sample.len() != expected || param_gen.remaining() != 0 {
            return Err(MlErr::SizeMismatch {
                what: "initial parameters",
                got: sample.len() + param_gen.remaining(),
                expected,
            });
        }

        self.params = sample;
        Ok(())
    }
}

/// A model's layer iterator.
///
/// This iterator iterates the layers of a model from the front.
pub struct FrontIter<'s> {
    params: &'s [f32],
    layer_sizes: &'s [usize],
}

impl<'s> Iterator for FrontIter<'s> {
    type Item = &'s [f32];

    fn next(&mut self) -> Option<Self::Item> {
        let (&size, rest) = self.layer_sizes.split_first()?;
        let (params, tail) = self.params.split_at(size);

        self.layer_sizes = rest;
        self.params = tail;
        Some(params)
    }
}

/// A model's layer iterator.
///
/// This iterator iterates the layers of a model from the back, yielding each layer's parameters
/// together with its gradient.
pub struct BackIter<'s> {
    params: &'s [f32],
    grad: &'s mut [f32],
    layer_sizes: &'s [usize],
}

impl<'s> Iterator for BackIter<'s> {
    type Item = (&'s [f32], &'s mut [f32]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&size, rest) = self.layer_sizes.split_last()?;
        let start = self.params.len() - size;

        let (head, params) = self.params.split_at(start);
        let (grad_head, grad) = mem::take(&mut self.grad).split_at_mut(start);

        self.layer_sizes = rest;
        self.params = head;
        self.grad = grad_head;
        Some((params, grad))
    }
}
