use ndarray::prelude::*;

use crate::{MlErr, Result, context::Context};

/// Flattens every sample of a batch into a row, `(n, d1, ..., dk) -> (n, d1·...·dk)`.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    input_shape: Option<IxDyn>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, ctx: &Context, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some((&n, rest)) = x.shape().split_first() else {
            return Err(MlErr::SizeMismatch {
                what: "flatten input rank",
                got: 0,
                expected: 1,
            });
        };

        let features = rest.iter().product::<usize>();
        let shape = x.raw_dim();
        let out = standard_layout(x).into_shape_with_order((n, features))?;

        self.input_shape = ctx.tracks_grad().then_some(shape);

        Ok(out.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape = self
            .input_shape
            .take()
            .ok_or(MlErr::MissingForwardCache { layer: "flatten" })?;

        Ok(standard_layout(d).into_shape_with_order(shape)?)
    }
}

fn standard_layout(x: ArrayD<f32>) -> ArrayD<f32> {
    if x.is_standard_layout() {
        x
    } else {
        x.as_standard_layout().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_and_restores() {
        let ctx = Context::default();
        let mut flatten = Flatten::new();
        let x = Array::from_shape_fn((2, 3, 2, 2), |(n, c, h, w)| {
            (n * 12 + c * 4 + h * 2 + w) as f32
        })
        .into_dyn();

        let y = flatten.forward(&ctx, x.clone()).unwrap();
        assert_eq!(y.shape(), &[2, 12]);
        assert_eq!(y.as_slice().unwrap()[12], 12.);

        let dx = flatten.backward(y).unwrap();
        assert_eq!(dx, x);
    }
}
