use rand::RngCore;

use super::ParamGen;

/// Concatenates the initialization policies of a model's layers.
///
/// `Sequential::init_default` collects every layer's generators in order (e.g. uniform kernels,
/// uniform biases, then a batch norm's ones and zeros), so the `n`-th sampled value lands on the
/// `n`-th parameter of the flat store. A request may span several links.
pub struct ChainedParamGen {
    links: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen` out of per layer generators, in parameter order.
    pub fn new(links: Vec<Box<dyn ParamGen>>) -> Self {
        Self { links, curr: 0 }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, rng: &mut dyn RngCore, n: usize) -> Option<Vec<f32>> {
        let mut sample = Vec::with_capacity(n);

        while sample.len() < n && self.curr < self.links.len() {
            match self.links[self.curr].sample(rng, n - sample.len()) {
                Some(part) => sample.extend(part),
                None => self.curr += 1,
            }
        }

        (!sample.is_empty()).then_some(sample)
    }

    fn remaining(&self) -> usize {
        self.links[self.curr..].iter().map(|link| link.remaining()).sum()
    }
}
