use super::Optimizer;

/// Adam with coupled L2 weight decay: the decay term `weight_decay * param` is added to the
/// gradient before the moments are updated.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    weight_decay: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    pub const BETA1: f32 = 0.9;
    pub const BETA2: f32 = 0.999;
    pub const EPSILON: f32 = 1e-8;

    /// Creates a new `Adam` optimizer with the usual hyper parameters.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters to optimize.
    /// * `learning_rate` - The step size.
    /// * `weight_decay` - The L2 penalty coefficient.
    ///
    /// # Returns
    /// A new `Adam` instance with zeroed moments.
    pub fn new(len: usize, learning_rate: f32, weight_decay: f32) -> Self {
        Self::with_hyper(
            len,
            learning_rate,
            weight_decay,
            Self::BETA1,
            Self::BETA2,
            Self::EPSILON,
        )
    }

    pub fn with_hyper(
        len: usize,
        learning_rate: f32,
        weight_decay: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    ) -> Self {
        Self {
            learning_rate,
            weight_decay,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) {
        let Self {
            learning_rate: lr,
            weight_decay: wd,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2_sqrt = (1. - self.beta2_t).sqrt();
        let step_size = lr / bc1;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.v.iter_mut())
            .zip(self.s.iter_mut())
            .for_each(|(((w, &g), v), s)| {
                let g = g + wd * *w;
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g * g;
                *w -= step_size * *v / (s.sqrt() / bc2_sqrt + eps);
            });
    }

    fn size(&self) -> usize {
        self.v.len()
    }
}
