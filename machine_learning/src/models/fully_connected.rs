use rand::RngCore;
use serde::Serialize;

use super::{Classifier, Network};
use crate::{
    MlErr, Result,
    arch::{
        Sequential,
        activations::ActFn,
        initialization::ChainedParamGen,
        layers::{Dense, Layer},
    },
    context::Context,
};

/// The hyper parameters of a `FullyConnected` model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FullyConnectedConfig {
    pub input_size: usize,
    pub hidden: (usize, usize),
    pub num_classes: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
}

impl FullyConnectedConfig {
    fn validate(&self) -> Result<()> {
        let (h1, h2) = self.hidden;
        if [self.input_size, h1, h2, self.num_classes].contains(&0) {
            return Err(MlErr::InvalidConfig(format!(
                "every layer needs at least one unit, got {} -> {h1} -> {h2} -> {}",
                self.input_size, self.num_classes
            )));
        }

        Ok(())
    }
}

/// A fully connected classifier: the input is flattened and goes through two hidden ReLU layers
/// and a final affine layer.
///
/// Hidden weights are Xavier normal, the output weights use the default uniform policy and every
/// bias starts at zero.
#[derive(Debug, Clone)]
pub struct FullyConnected {
    net: Network,
    config: FullyConnectedConfig,
}

impl FullyConnected {
    /// Creates a new `FullyConnected` model with a configured optimizer.
    ///
    /// # Arguments
    /// * `ctx` - The context the model is built for.
    /// * `config` - The model's hyper parameters.
    /// * `rng` - The random number generator used for initialization.
    ///
    /// # Returns
    /// A new `FullyConnected` instance or an error if the configuration is invalid.
    pub fn new(ctx: &Context, config: FullyConnectedConfig, rng: &mut dyn RngCore) -> Result<Self> {
        config.validate()?;

        let (h1, h2) = config.hidden;
        let hidden1 = Dense::new((config.input_size, h1), Some(ActFn::relu()));
        let hidden2 = Dense::new((h1, h2), Some(ActFn::relu()));
        let output = Dense::new((h2, config.num_classes), None);

        let mut param_gens = hidden1.xavier_param_gens()?;
        param_gens.extend(hidden2.xavier_param_gens()?);
        param_gens.extend(output.zero_bias_param_gens()?);

        let mut seq = Sequential::new([
            Layer::flatten(),
            Layer::Dense(hidden1),
            Layer::Dense(hidden2),
            Layer::Dense(output),
        ]);
        seq.init(&mut ChainedParamGen::new(param_gens), rng)?;

        let net = Network::new(
            ctx,
            seq,
            config.num_classes,
            config.learning_rate,
            config.weight_decay,
        )?;

        let mut model = Self { net, config };
        model.configure_optimizer();
        Ok(model)
    }

    pub fn config(&self) -> FullyConnectedConfig {
        self.config
    }
}

impl Classifier for FullyConnected {
    fn network(&self) -> &Network {
        &self.net
    }

    fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }
}
