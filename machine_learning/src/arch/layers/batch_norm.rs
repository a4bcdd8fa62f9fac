use ndarray::prelude::*;

use super::dense::check_len;
use crate::{
    MlErr, Result,
    arch::initialization::{ConstParamGen, ParamGen},
    context::Context,
};

/// Per channel batch normalization over batches of shape `(n, channels, height, width)`.
///
/// The learnable parameters are the `channels` scales (gamma) followed by the `channels` shifts
/// (beta). The running statistics are buffers owned by the layer: they are updated by gradient
/// tracking passes and used instead of the batch statistics by `no_grad` passes.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    channels: usize,
    momentum: f32,
    eps: f32,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Forward metadata
    cache: Option<Cache>,
}

#[derive(Debug, Clone)]
struct Cache {
    x_hat: Array4<f32>,
    inv_std: Array1<f32>,
}

impl BatchNorm2d {
    pub const MOMENTUM: f32 = 0.1;
    pub const EPS: f32 = 1e-5;

    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            momentum: Self::MOMENTUM,
            eps: Self::EPS,
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            cache: None,
        }
    }

    pub fn size(&self) -> usize {
        2 * self.channels
    }

    pub fn running_mean(&self) -> ArrayView1<'_, f32> {
        self.running_mean.view()
    }

    pub fn running_var(&self) -> ArrayView1<'_, f32> {
        self.running_var.view()
    }

    /// Gamma starts at one and beta at zero.
    pub fn param_gens(&self) -> Result<Vec<Box<dyn ParamGen>>> {
        Ok(vec![
            Box::new(ConstParamGen::new(1., self.channels)),
            Box::new(ConstParamGen::zeros(self.channels)),
        ])
    }

    pub fn forward(&mut self, ctx: &Context, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();
        if c != self.channels {
            return Err(MlErr::SizeMismatch {
                what: "batch norm channels",
                got: c,
                expected: self.channels,
            });
        }

        let (gamma, beta) = self.view_params(params)?;

        if !ctx.tracks_grad() {
            self.cache = None;
            let inv_std = self.running_var.mapv(|var| 1. / (var + self.eps).sqrt());
            let x_hat = (&x - &per_channel(self.running_mean.view())?)
                * &per_channel(inv_std.view())?;
            return Ok(affine(x_hat, gamma, beta)?.into_dyn());
        }

        let m = n * h * w;
        if m == 0 {
            return Err(MlErr::EmptyBatches {
                what: "values per channel to normalize",
            });
        }

        let mean = channel_sums(x.view()) / m as f32;
        let centered = &x - &per_channel(mean.view())?;
        let var = channel_sums(centered.mapv(|v| v * v).view()) / m as f32;
        let inv_std = var.mapv(|var| 1. / (var + self.eps).sqrt());
        let x_hat = centered * &per_channel(inv_std.view())?;

        let unbiased = if m > 1 {
            &var * (m as f32 / (m - 1) as f32)
        } else {
            var
        };
        let mom = self.momentum;
        self.running_mean = &self.running_mean * (1. - mom) + &mean * mom;
        self.running_var = &self.running_var * (1. - mom) + &unbiased * mom;

        let y = affine(x_hat.clone(), gamma, beta)?;
        self.cache = Some(Cache { x_hat, inv_std });

        Ok(y.into_dyn())
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let d = d.into_dimensionality::<Ix4>()?;
        let Cache { x_hat, inv_std } = self.cache.take().ok_or(MlErr::MissingForwardCache {
            layer: "batch_norm2d",
        })?;

        if d.dim() != x_hat.dim() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm output gradient",
                got: d.len(),
                expected: x_hat.len(),
            });
        }

        let (n, _, h, w) = d.dim();
        let m = (n * h * w) as f32;

        let dbeta = channel_sums(d.view());
        let dgamma = channel_sums((&d * &x_hat).view());

        let (gamma, _) = self.view_params(params)?;
        let scale = &gamma * &inv_std / m;

        // dx = gamma / (m·std) · (m·d - sum(d) - x_hat·sum(d·x_hat))
        let dx = (&d * m - &per_channel(dbeta.view())? - &x_hat * &per_channel(dgamma.view())?)
            * &per_channel(scale.view())?;

        check_len("batch norm gradient", grad.len(), self.size())?;
        let (grad_gamma, grad_beta) = grad.split_at_mut(self.channels);
        grad_gamma
            .iter_mut()
            .zip(&dgamma)
            .for_each(|(g, dg)| *g += dg);
        grad_beta.iter_mut().zip(&dbeta).for_each(|(g, db)| *g += db);

        Ok(dx.into_dyn())
    }

    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        check_len("batch norm parameters", params.len(), self.size())?;

        let (gamma, beta) = params.split_at(self.channels);
        Ok((ArrayView1::from(gamma), ArrayView1::from(beta)))
    }
}

/// Sums every axis but the channel one.
fn channel_sums(x: ArrayView4<f32>) -> Array1<f32> {
    x.sum_axis(Axis(3)).sum_axis(Axis(2)).sum_axis(Axis(0))
}

/// Views a per channel vector as `(1, channels, 1, 1)` so that it broadcasts over a batch.
fn per_channel(v: ArrayView1<'_, f32>) -> Result<ArrayView4<'_, f32>> {
    let channels = v.len();
    Ok(v.into_shape_with_order((1, channels, 1, 1))?)
}

fn affine(x_hat: Array4<f32>, gamma: ArrayView1<f32>, beta: ArrayView1<f32>) -> Result<Array4<f32>> {
    Ok(x_hat * &per_channel(gamma)? + &per_channel(beta)?)
}
