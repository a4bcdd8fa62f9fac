/// Rectified linear unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn new() -> Self {
        Self
    }

    /// Clamps negatives to zero, NaN goes through untouched.
    pub fn f(&self, z: f32) -> f32 {
        if z > 0. || z.is_nan() { z } else { 0. }
    }

    /// The derivative at `z`, 0 at the kink.
    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { 0. }
    }
}
