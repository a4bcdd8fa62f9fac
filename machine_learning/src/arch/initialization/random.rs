use rand::RngCore;
use rand_distr::{Distribution, Normal, Uniform};

use super::ParamGen;
use crate::{MlErr, Result};

/// A parameter generator that follows a certain probabilistic distribution.
pub struct RandParamGen<D: Distribution<f32>> {
    distribution: D,
    remaining: usize,
}

impl<D: Distribution<f32>> RandParamGen<D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(distribution: D, limit: usize) -> Self {
        Self {
            distribution,
            remaining: limit,
        }
    }
}

impl RandParamGen<Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(limit: usize, low: f32, high: f32) -> Result<Self> {
        let distribution = Uniform::new(low, high)
            .map_err(|e| MlErr::InvalidConfig(format!("uniform({low}, {high}): {e}")))?;

        Ok(Self::new(distribution, limit))
    }

    /// Creates a new `RandParamGen` parameter generator with the default policy of dense and
    /// convolutional layers: `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, which is what Kaiming uniform
    /// with `a = sqrt(5)` reduces to. Used for both weights and biases.
    ///
    /// # Arguments
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of inputs feeding each output unit.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn fan_in_uniform(limit: usize, fan_in: usize) -> Result<Self> {
        let bound = 1. / (fan_in as f32).sqrt();
        Self::uniform(limit, -bound, bound)
    }
}

impl RandParamGen<Normal<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a normal distribution.
    ///
    /// # Arguments
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (Nan or infinite).
    pub fn normal(limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        let distribution = Normal::new(mean, std_dev)
            .map_err(|e| MlErr::InvalidConfig(format!("normal({mean}, {std_dev}): {e}")))?;

        Ok(Self::new(distribution, limit))
    }

    /// Creates a new `RandParamGen` parameter generator using Xavier normal initialization.
    ///
    /// # Arguments
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated standard deviation is not finite (Nan or infinite).
    pub fn xavier(limit: usize, fan_in: usize, fan_out: usize) -> Result<Self> {
        let std_dev = (2. / (fan_in + fan_out) as f32).sqrt();
        Self::normal(limit, 0., std_dev)
    }
}

impl<D: Distribution<f32>> ParamGen for RandParamGen<D> {
    fn sample(&mut self, rng: &mut dyn RngCore, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;
        Some((0..n).map(|_| self.distribution.sample(rng)).collect())
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
    fn fan_in_uniform_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut param_gen = RandParamGen::fan_in_uniform(1000, 16).unwrap();

        let sample = param_gen.sample(&mut rng, 1000).unwrap();
        assert_eq!(sample.len(), 1000);
        assert!(sample.iter().all(|w| w.abs() <= 0.25));
        assert!(param_gen.sample(&mut rng, 1).is_none());
    }

    #[test]
    fn xavier_has_the_expected_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let (fan_in, fan_out) = (300, 100);
        let n = 20_000;
        let mut param_gen = RandParamGen::xavier(n, fan_in, fan_out).unwrap();

        let sample = param_gen.sample(&mut rng, n).unwrap();
        let mean = sample.iter().sum::<f32>() / n as f32;
        let var = sample.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / n as f32;
        let expected = 2. / (fan_in + fan_out) as f32;

        assert!(mean.abs() < 0.01);
        assert!((var - expected).abs() / expected < 0.1);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(RandParamGen::uniform(1, 1., 1.).is_err());
        assert!(RandParamGen::normal(1, 0., f32::NAN).is_err());
    }
}
