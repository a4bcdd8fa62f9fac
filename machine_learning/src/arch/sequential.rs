use ndarray::ArrayD;
use rand::RngCore;

use super::{
    initialization::{ChainedParamGen, ParamGen},
    layers::Layer,
    params::ParamStore,
};
use crate::{Result, context::Context, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns its layers and the flat store of their parameters and gradient.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
    store: ParamStore,
}

impl Sequential {
    /// Creates a new `Sequential` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<_> = layers.into_iter().collect();
        let store = ParamStore::new(layers.iter().map(Layer::size).collect());

        Self { layers, store }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn params(&self) -> &[f32] {
        self.store.params()
    }

    pub fn grad(&self) -> &[f32] {
        self.store.grad()
    }

    /// Initializes the parameters of every layer, in order, with `param_gen`.
    ///
    /// # Arguments
    /// * `param_gen` - A generator covering exactly `size` parameters.
    /// * `rng` - The random number generator.
    pub fn init(&mut self, param_gen: &mut dyn ParamGen, rng: &mut dyn RngCore) -> Result<()> {
        self.store.init(param_gen, rng)
    }

    /// Initializes every layer with its own default policy.
    pub fn init_default(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let mut param_gens = Vec::new();
        for layer in &self.layers {
            param_gens.extend(layer.param_gens()?);
        }

        self.init(&mut ChainedParamGen::new(param_gens), rng)
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `ctx` - The execution context.
    /// * `x` - The input batch.
    ///
    /// # Returns
    /// The output of the last layer or an error if occurred.
    pub fn forward(&mut self, ctx: &Context, mut x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        for (layer, params) in self.layers.iter_mut().zip(self.store.front()) {
            x = layer.forward(ctx, params, x)?;
        }

        Ok(x)
    }

    /// Backpropagates the gradient of the loss with respect to the model's output, accumulating
    /// the gradient of every parameter.
    ///
    /// # Arguments
    /// * `ctx` - The execution context.
    /// * `d` - The gradient of the loss with respect to the output of the last forward pass.
    ///
    /// # Returns
    /// The gradient of the loss with respect to the model's input.
    pub fn backward(&mut self, ctx: &Context, mut d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        for (layer, (params, grad)) in self.layers.iter_mut().rev().zip(self.store.back()) {
            d = layer.backward(ctx, params, grad, d)?;
        }

        Ok(d)
    }

    pub fn zero_grad(&mut self) {
        self.store.zero_grad();
    }

    /// Applies the accumulated gradient onto the parameters.
    pub fn optimize<O: Optimizer>(&mut self, optimizer: &mut O) -> Result<()> {
        self.store.optimize(optimizer)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        arch::{activations::ActFn, initialization::ConstParamGen},
        optimization::Adam,
    };

    fn net() -> Sequential {
        Sequential::new([
            Layer::flatten(),
            Layer::dense((4, 3), Some(ActFn::relu())),
            Layer::dense((3, 2), None),
        ])
    }

    #[test]
    fn size_sums_layers() {
        assert_eq!(net().size(), 15 + 8);
    }

    #[test]
    fn default_init_fills_every_parameter() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seq = net();
        seq.init_default(&mut rng).unwrap();

        assert!(seq.params().iter().any(|&p| p != 0.));
        assert!(seq.params().iter().all(|p| p.abs() <= 1. / 3f32.sqrt()));
    }

    #[test]
    fn init_rejects_wrong_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seq = net();

        assert!(seq.init(&mut ConstParamGen::new(1., 3), &mut rng).is_err());
    }

    #[test]
    fn forward_backward_step() {
        let ctx = Context::default();
        let mut rng = StdRng::seed_from_u64(2);
        let mut seq = net();
        seq.init(&mut ConstParamGen::new(0.1, seq.size()), &mut rng)
            .unwrap();

        let x = Array3::<f32>::ones((5, 2, 2)).into_dyn();
        let y = seq.forward(&ctx, x).unwrap();
        assert_eq!(y.shape(), &[5, 2]);

        let dx = seq.backward(&ctx, Array2::ones((5, 2)).into_dyn()).unwrap();
        assert_eq!(dx.shape(), &[5, 2, 2]);
        assert!(seq.grad().iter().all(|&g| g > 0.));

        let before = seq.params().to_vec();
        let mut adam = Adam::new(seq.size(), 0.01, 0.);
        seq.optimize(&mut adam).unwrap();
        seq.zero_grad();

        assert!(seq.params().iter().zip(&before).all(|(p, b)| p < b));
        assert!(seq.grad().iter().all(|&g| g == 0.));
    }
}
