use rand::RngCore;

use super::ParamGen;

/// A parameter generator that always generates the same value.
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    /// * `limit` - The maximum amount of times to generate that value.
    ///
    /// # Returns
    /// A new `ConstParamGen` instance.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }

    /// Zero initialization, used for biases.
    pub fn zeros(limit: usize) -> Self {
        Self::new(0., limit)
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, _rng: &mut dyn RngCore, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;
        Some(vec![self.value; n])
    }

    fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut param_gen = ConstParamGen::new(1., 0);
        assert!(param_gen.sample(&mut rng, 1).is_none());
    }

    #[test]
    fn partial() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut param_gen = ConstParamGen::new(1., 10);

        let sample = param_gen.sample(&mut rng, 7).unwrap();
        assert_eq!(sample, vec![1.; 7]);
        assert_eq!(param_gen.remaining(), 3);

        let sample = param_gen.sample(&mut rng, 7).unwrap();
        assert_eq!(sample, vec![1.; 3]);
        assert!(param_gen.sample(&mut rng, 1).is_none());
    }
}
