use ndarray::prelude::*;
use rayon::prelude::*;

use super::dense::check_len;
use crate::{
    MlErr, Result,
    arch::{
        activations::ActFn,
        initialization::{ParamGen, RandParamGen},
    },
    context::{Context, Device},
};

/// The geometry of a square 2d convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
}

impl ConvSpec {
    /// A `kernel`×`kernel` convolution with stride 1 and "same" padding.
    pub fn same(in_channels: usize, out_channels: usize, kernel: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            stride: 1,
            padding: kernel / 2,
        }
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel * self.kernel
    }
}

/// A 2d convolution over batches of shape `(n, channels, height, width)`.
///
/// The parameters are laid out as the kernels `(out_channels, in_channels·k·k)` followed by the
/// `out_channels` biases. The convolution is computed as a matrix product against the unrolled
/// patches of each sample.
#[derive(Debug, Clone)]
pub struct Conv2d {
    spec: ConvSpec,
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Option<Array4<f32>>,
    z: Option<Array4<f32>>,
}

impl Conv2d {
    /// Creates a new `Conv2d` layer.
    ///
    /// # Arguments
    /// * `spec` - The geometry of the convolution.
    /// * `act_fn` - An optional activation applied to the convolution's output.
    ///
    /// # Returns
    /// A new `Conv2d` instance.
    pub fn new(spec: ConvSpec, act_fn: Option<ActFn>) -> Self {
        Self {
            size: spec.out_channels * (spec.patch_len() + 1),
            spec,
            act_fn,
            x: None,
            z: None,
        }
    }

    pub fn spec(&self) -> ConvSpec {
        self.spec
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The default initialization: `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` for kernels and biases,
    /// where `fan_in = in_channels·k·k`.
    pub fn param_gens(&self) -> Result<Vec<Box<dyn ParamGen>>> {
        let fan_in = self.spec.patch_len();
        let out = self.spec.out_channels;

        Ok(vec![
            Box::new(RandParamGen::fan_in_uniform(out * fan_in, fan_in)?),
            Box::new(RandParamGen::fan_in_uniform(out, fan_in)?),
        ])
    }

    /// Computes the spatial size of the output for an input of `(height, width)`.
    pub fn output_dim(&self, (h, w): (usize, usize)) -> Result<(usize, usize)> {
        let ConvSpec {
            kernel: k,
            stride: s,
            padding: p,
            ..
        } = self.spec;

        if h + 2 * p < k || w + 2 * p < k || s == 0 {
            return Err(MlErr::InvalidConfig(format!(
                "a {k}x{k} kernel with stride {s} and padding {p} doesn't fit a {h}x{w} input"
            )));
        }

        Ok(((h + 2 * p - k) / s + 1, (w + 2 * p - k) / s + 1))
    }

    pub fn forward(&mut self, ctx: &Context, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();
        if c != self.spec.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv input channels",
                got: c,
                expected: self.spec.in_channels,
            });
        }

        let (oh, ow) = self.output_dim((h, w))?;
        let (kernels, biases) = self.view_params(params)?;
        let mut z = Array4::zeros((n, self.spec.out_channels, oh, ow));

        let this = &*self;
        let forward_sample = |mut zi: ArrayViewMut3<f32>, xi: ArrayView3<f32>| -> Result<()> {
            let cols = this.im2col(xi, (oh, ow));
            let mut out = kernels.dot(&cols);
            out += &biases.insert_axis(Axis(1));
            zi.assign(&out.into_shape_with_order(zi.raw_dim())?);
            Ok(())
        };

        match ctx.device() {
            Device::Cpu => z
                .outer_iter_mut()
                .zip(x.outer_iter())
                .try_for_each(|(zi, xi)| forward_sample(zi, xi))?,
            Device::Parallel => z
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(x.axis_iter(Axis(0)))
                .try_for_each(|(zi, xi)| forward_sample(zi, xi))?,
        }

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

    pub fn backward(
        &mut self,
        ctx: &Context,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let mut d = d.into_dimensionality::<Ix4>()?;
        let x = self
            .x
            .take()
            .ok_or(MlErr::MissingForwardCache { layer: "conv2d" })?;

        let (n, _, h, w) = x.dim();
        let (oh, ow) = self.output_dim((h, w))?;
        let expected = (n, self.spec.out_channels, oh, ow);
        if d.dim() != expected {
            return Err(MlErr::SizeMismatch {
                what: "conv output gradient",
                got: d.len(),
                expected: n * self.spec.out_channels * oh * ow,
            });
        }

        if let Some(act_fn) = &self.act_fn {
            let z = self
                .z
                .take()
                .ok_or(MlErr::MissingForwardCache { layer: "conv2d" })?;

            d.zip_mut_with(&z, |d, &z| *d *= act_fn.df(z));
        }

        let (kernels, _) = self.view_params(params)?;
        let mut dx = Array4::zeros(x.raw_dim());

        let this = &*self;
        let zeros = || {
            (
                Array2::zeros(kernels.raw_dim()),
                Array1::zeros(this.spec.out_channels),
            )
        };
        let accumulate = |(mut dw, mut db): (Array2<f32>, Array1<f32>),
                          ((dxi, xi), di): (
            (ArrayViewMut3<f32>, ArrayView3<f32>),
            ArrayView3<f32>,
        )|
         -> Result<(Array2<f32>, Array1<f32>)> {
            let di = di.to_shape((this.spec.out_channels, oh * ow))?;
            let cols = this.im2col(xi, (oh, ow));

            ndarray::linalg::general_mat_mul(1.0, &di, &cols.t(), 1.0, &mut dw);
            db += &di.sum_axis(Axis(1));
            this.col2im(kernels.t().dot(&di).view(), (oh, ow), dxi);
            Ok((dw, db))
        };

        let (dw, db) = match ctx.device() {
            Device::Cpu => dx
                .outer_iter_mut()
                .zip(x.outer_iter())
                .zip(d.outer_iter())
                .try_fold(zeros(), accumulate)?,
            Device::Parallel => dx
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(x.axis_iter(Axis(0)))
                .zip(d.axis_iter(Axis(0)))
                .try_fold(zeros, accumulate)
                .try_reduce(zeros, |a, b| Ok((a.0 + b.0, a.1 + b.1)))?,
        };

        let (mut grad_w, mut grad_b) = self.view_grad(grad)?;
        grad_w += &dw;
        grad_b += &db;

        Ok(dx.into_dyn())
    }

    /// Unrolls every receptive field of `x` into a column.
    ///
    /// # Arguments
    /// * `x` - A single sample of shape `(channels, height, width)`.
    /// * `out_dim` - The spatial size of the output.
    ///
    /// # Returns
    /// A matrix of shape `(channels·k·k, out_height·out_width)`.
    fn im2col(&self, x: ArrayView3<f32>, (oh, ow): (usize, usize)) -> Array2<f32> {
        let mut cols = Array2::zeros((self.spec.patch_len(), oh * ow));

        self.for_each_tap(x.dim(), (oh, ow), |row, col, (ci, iy, ix)| {
            cols[[row, col]] = x[[ci, iy, ix]];
        });

        cols
    }

    /// Adds every column of `cols` back onto the receptive field it was unrolled from, the
    /// adjoint of `im2col`.
    fn col2im(&self, cols: ArrayView2<f32>, (oh, ow): (usize, usize), mut dx: ArrayViewMut3<f32>) {
        self.for_each_tap(dx.dim(), (oh, ow), |row, col, (ci, iy, ix)| {
            dx[[ci, iy, ix]] += cols[[row, col]];
        });
    }

    /// Visits every (patch row, output position) pair that lands inside the input, skipping the
    /// zero padding.
    fn for_each_tap<F>(&self, (c, h, w): (usize, usize, usize), (oh, ow): (usize, usize), mut f: F)
    where
        F: FnMut(usize, usize, (usize, usize, usize)),
    {
        let ConvSpec {
            kernel: k,
            stride: s,
            padding: p,
            ..
        } = self.spec;

        for ci in 0..c {
            for ky in 0..k {
                for kx in 0..k {
                    let row = (ci * k + ky) * k + kx;

                    for oy in 0..oh {
                        let Some(iy) = (oy * s + ky).checked_sub(p).filter(|&iy| iy < h) else {
                            continue;
                        };

                        for ox in 0..ow {
                            let Some(ix) = (ox * s + kx).checked_sub(p).filter(|&ix| ix < w)
                            else {
                                continue;
                            };

                            f(row, oy * ow + ox, (ci, iy, ix));
                        }
                    }
                }
            }
        }
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        check_len("conv gradient", grad.len(), self.size)?;

        let dim = (self.spec.out_channels, self.spec.patch_len());
        let (dw_raw, db_raw) = grad.split_at_mut(dim.0 * dim.1);
        Ok((
            ArrayViewMut2::from_shape(dim, dw_raw)?,
            ArrayViewMut1::from_shape(dim.0, db_raw)?,
        ))
    }

    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        check_len("conv parameters", params.len(), self.size)?;

        let dim = (self.spec.out_channels, self.spec.patch_len());
        let (w_raw, b_raw) = params.split_at(dim.0 * dim.1);
        Ok((
            ArrayView2::from_shape(dim, w_raw)?,
            ArrayView1::from_shape(dim.0, b_raw)?,
        ))
    }
}
