use super::Relu;

/// An activation function fused at the output of a parametric layer.
#[derive(Clone, Copy, Debug)]
pub enum ActFn {
    Relu(Relu),
}

impl ActFn {
    pub fn relu() -> Self {
        ActFn::Relu(Relu::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            ActFn::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            ActFn::Relu(a) => a.df(x),
        }
    }
}
