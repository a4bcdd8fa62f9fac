use ndarray::{linalg, prelude::*};

use crate::{
    MlErr, Result,
    arch::{
        activations::ActFn,
        initialization::{ConstParamGen, ParamGen, RandParamGen},
    },
    context::Context,
};

/// A fully connected layer, `a = act_fn(x·W + b)`.
///
/// The parameters are laid out as the weights matrix `(in, out)` in row major order followed by
/// the `out` biases.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Option<Array2<f32>>,
    z: Option<Array2<f32>>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output widths.
    /// * `act_fn` - An optional activation applied to the affine output.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: None,
            z: None,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The default initialization: `U(-1/sqrt(in), 1/sqrt(in))` for weights and biases.
    pub fn param_gens(&self) -> Result<Vec<Box<dyn ParamGen>>> {
        let (fan_in, fan_out) = self.dim;

        Ok(vec![
            Box::new(RandParamGen::fan_in_uniform(fan_in * fan_out, fan_in)?),
            Box::new(RandParamGen::fan_in_uniform(fan_out, fan_in)?),
        ])
    }

    /// Xavier normal weights and zero biases.
    pub fn xavier_param_gens(&self) -> Result<Vec<Box<dyn ParamGen>>> {
        let (fan_in, fan_out) = self.dim;

        Ok(vec![
            Box::new(RandParamGen::xavier(fan_in * fan_out, fan_in, fan_out)?),
            Box::new(ConstParamGen::zeros(fan_out)),
        ])
    }

    /// Default weights and zero biases.
    pub fn zero_bias_param_gens(&self) -> Result<Vec<Box<dyn ParamGen>>> {
        let (fan_in, fan_out) = self.dim;

        Ok(vec![
            Box::new(RandParamGen::fan_in_uniform(fan_in * fan_out, fan_in)?),
            Box::new(ConstParamGen::zeros(fan_out)),
        ])
    }

    /// Makes a forward pass through the layer.
    ///
    /// # Arguments
    /// * `ctx` - The execution context, the input is only kept around when tracking gradients.
    /// * `params` - This layer's parameters.
    /// * `x` - A batch of shape `(n, in)`.
    ///
    /// # Returns
    /// The activations of shape `(n, out)`.
    pub fn forward(&mut self, ctx: &Context, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix2>()?;
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input width",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;

        // A no_grad pass drops the caches of any earlier tracked pass.
        let tracks_grad = ctx.tracks_grad();
        let a = match &self.act_fn {
            Some(act_fn) => {
                let a = z.mapv(|z| act_fn.f(z));
                self.z = tracks_grad.then_some(z);
                a
            }
            None => {
                self.z = None;
                z
            }
        };

        self.x = tracks_grad.then_some(x);

        Ok(a.into_dyn())
    }

    /// Backpropagates `d` through the layer, accumulating the parameter gradients into `grad`.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's gradient.
    /// * `d` - The gradient of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The gradient of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let mut d = d.into_dimensionality::<Ix2>()?;
        let x = self
            .x
            .take()
            .ok_or(MlErr::MissingForwardCache { layer: "dense" })?;

        if d.dim() != (x.nrows(), self.dim.1) {
            return Err(MlErr::SizeMismatch {
                what: "dense output gradient",
                got: d.len(),
                expected: x.nrows() * self.dim.1,
            });
        }

        if let Some(act_fn) = &self.act_fn {
            let z = self
                .z
                .take()
                .ok_or(MlErr::MissingForwardCache { layer: "dense" })?;

            d.zip_mut_with(&z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()).into_dyn())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        check_len("dense gradient", grad.len(), self.size)?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        check_len("dense parameters", params.len(), self.size)?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}

/// Fails if a layer received a slice of the wrong length.
pub(super) fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::layers::{
        Layer,
        tests::{assert_gradients_match, seeded_input, seeded_params},
    };

    #[test]
    fn forward_is_affine() {
        let mut dense = Dense::new((2, 3), None);
        let params = [1., 2., 3., 4., 5., 6., 0.5, 0., -0.5];
        let x = array![[1., 1.], [0., 2.]].into_dyn();

        let y = dense.forward(&Context::default(), &params, x).unwrap();

        assert_eq!(y, array![[5.5, 7., 8.5], [8.5, 10., 11.5]].into_dyn());
    }

    #[test]
    fn rejects_wrong_width() {
        let mut dense = Dense::new((4, 2), None);
        let params = vec![0.; dense.size()];
        let x = Array2::<f32>::zeros((3, 5)).into_dyn();

        let err = dense.forward(&Context::default(), &params, x);
        assert!(matches!(err, Err(MlErr::SizeMismatch { got: 5, .. })));
    }

    #[test]
    fn backward_requires_a_tracked_forward() {
        let mut dense = Dense::new((2, 2), Some(ActFn::relu()));
        let params = vec![0.1; dense.size()];
        let mut grad = vec![0.; dense.size()];
        let x = Array2::<f32>::ones((1, 2)).into_dyn();

        dense
            .forward(&Context::default().no_grad(), &params, x)
            .unwrap();
        let err = dense.backward(&params, &mut grad, Array2::ones((1, 2)).into_dyn());

        assert!(matches!(err, Err(MlErr::MissingForwardCache { .. })));
    }

    #[test]
    fn relu_blocks_negative_units() {
        let ctx = Context::default();
        let mut dense = Dense::new((2, 2), Some(ActFn::relu()));
        let params = [1., 0., 0., -1., 0., 0.];
        let mut grad = [0.; 6];

        let a = dense.forward(&ctx, &params, array![[1., 1.]].into_dyn()).unwrap();
        assert_eq!(a, array![[1., 0.]].into_dyn());

        let dx = dense
            .backward(&params, &mut grad, array![[1., 1.]].into_dyn())
            .unwrap();

        assert_eq!(dx, array![[1., 0.]].into_dyn());
        assert_eq!(grad, [1., 0., 1., 0., 1., 0.]);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut layer = Layer::dense((5, 4), None);
        let params = seeded_params(layer.size(), 3);

        assert_gradients_match(&mut layer, &params, &seeded_input(&[3, 5], 4));
    }
}
