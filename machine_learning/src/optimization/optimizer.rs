/// A learning rule applied to a flat parameter vector given its gradient.
pub trait Optimizer {
    /// Takes a single optimization step.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient used for taking the step.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]);

    /// The amount of parameters this optimizer keeps state for.
    fn size(&self) -> usize;
}
