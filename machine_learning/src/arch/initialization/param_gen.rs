use rand::RngCore;

/// A source of initial parameter values.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` if the generator is exhausted.
    fn sample(&mut self, rng: &mut dyn RngCore, n: usize) -> Option<Vec<f32>>;

    /// Should return the amount of parameters this generator can still generate.
    ///
    /// # Returns
    /// The amount of remaining parameters.
    fn remaining(&self) -> usize;
}
