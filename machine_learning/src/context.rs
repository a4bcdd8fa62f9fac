use std::fmt::{self, Display};

use serde::Serialize;

/// The compute target of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Every kernel runs on the calling thread.
    #[default]
    Cpu,
    /// Convolution and pooling kernels split the batch across the rayon pool.
    Parallel,
}

impl Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Parallel => write!(f, "cpu ({} threads)", rayon::current_num_threads()),
        }
    }
}

/// Whether a forward pass records what `backward` needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum GradMode {
    #[default]
    Enabled,
    Disabled,
}

/// The execution context threaded through model construction and every batch computation.
///
/// A gradient tracking context caches activations and makes batch normalization use (and
/// update) batch statistics. A `no_grad` context computes the forward pass only, using the
/// running statistics, and leaves every buffer of the model untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    device: Device,
    grad: GradMode,
}

impl Context {
    /// Creates a new gradient tracking `Context`.
    ///
    /// # Arguments
    /// * `device` - The compute target.
    ///
    /// # Returns
    /// A new `Context` instance.
    pub fn new(device: Device) -> Self {
        Self {
            device,
            grad: GradMode::Enabled,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn tracks_grad(&self) -> bool {
        self.grad == GradMode::Enabled
    }

    /// Returns a copy of this context with gradient tracking turned off.
    pub fn no_grad(&self) -> Self {
        Self {
            grad: GradMode::Disabled,
            ..*self
        }
    }

    /// Returns a copy of this context with gradient tracking turned on.
    pub fn with_grad(&self) -> Self {
        Self {
            grad: GradMode::Enabled,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_grad_keeps_the_device() {
        let ctx = Context::new(Device::Parallel);
        let inference = ctx.no_grad();

        assert!(ctx.tracks_grad());
        assert!(!inference.tracks_grad());
        assert_eq!(inference.device(), Device::Parallel);
        assert_eq!(inference.with_grad(), ctx);
    }
}
