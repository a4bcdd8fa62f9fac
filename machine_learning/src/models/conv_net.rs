use rand::RngCore;

use super::{Classifier, Network};
use crate::{
    Result,
    arch::{
        Sequential,
        activations::ActFn,
        layers::{ConvSpec, Layer},
    },
    context::Context,
};

/// A convolutional classifier for `3x32x32` images and 10 classes.
///
/// Three stages of two 3x3 convolutions, a 2x2 max pooling and a batch normalization take the
/// image down to `256x4x4`, followed by a three layer fully connected head.
#[derive(Debug, Clone)]
pub struct ConvNet {
    net: Network,
}

impl ConvNet {
    pub const INPUT_SHAPE: [usize; 3] = [3, 32, 32];
    pub const NUM_CLASSES: usize = 10;

    const STAGES: [(usize, usize, usize); 3] = [(3, 32, 64), (64, 128, 128), (128, 256, 256)];

    /// Creates a new `ConvNet` with a configured optimizer, using the default initialization of
    /// every layer.
    ///
    /// # Arguments
    /// * `ctx` - The context the model is built for.
    /// * `learning_rate` - Adam's step size.
    /// * `weight_decay` - The L2 penalty coefficient.
    /// * `rng` - The random number generator used for initialization.
    pub fn new(
        ctx: &Context,
        learning_rate: f32,
        weight_decay: f32,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        let mut layers = Vec::new();
        for (c_in, c_mid, c_out) in Self::STAGES {
            layers.extend([
                Layer::conv2d(ConvSpec::same(c_in, c_mid, 3), Some(ActFn::relu())),
                Layer::conv2d(ConvSpec::same(c_mid, c_out, 3), Some(ActFn::relu())),
                Layer::max_pool2d(2),
                Layer::batch_norm2d(c_out),
            ]);
        }

        layers.extend([
            Layer::flatten(),
            Layer::dense((256 * 4 * 4, 1024), Some(ActFn::relu())),
            Layer::dense((1024, 512), Some(ActFn::relu())),
            Layer::dense((512, Self::NUM_CLASSES), None),
        ]);

        let mut seq = Sequential::new(layers);
        seq.init_default(rng)?;

        let net = Network::new(ctx, seq, Self::NUM_CLASSES, learning_rate, weight_decay)?;
        let mut model = Self { net };
        model.configure_optimizer();
        Ok(model)
    }
}

impl Classifier for ConvNet {
    fn network(&self) -> &Network {
        &self.net
    }

    fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }
}
