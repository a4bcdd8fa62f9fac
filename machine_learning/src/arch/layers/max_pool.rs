use ndarray::{Zip, prelude::*};

use crate::{
    MlErr, Result,
    context::{Context, Device},
};

/// A `k`×`k` max pooling with stride `k` over batches of shape `(n, channels, height, width)`.
///
/// Trailing rows and columns that don't fill a whole window are dropped. Ties are resolved in
/// favour of the first maximum in row major order, which is also where the gradient is routed. A
/// window holding a NaN pools to NaN.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    kernel: usize,

    // Forward metadata: the input's spatial size and the flat position of every window's maximum.
    cache: Option<((usize, usize), Array4<usize>)>,
}

impl MaxPool2d {
    pub fn new(kernel: usize) -> Self {
        Self {
            kernel,
            cache: None,
        }
    }

    pub fn kernel(&self) -> usize {
        self.kernel
    }

    pub fn forward(&mut self, ctx: &Context, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();
        let k = self.kernel;

        if k == 0 || h < k || w < k {
            return Err(MlErr::SizeMismatch {
                what: "max pool input side",
                got: h.min(w),
                expected: k.max(1),
            });
        }

        let out_dim = (n, c, h / k, w / k);
        let mut out = Array4::zeros(out_dim);
        let mut argmax = Array4::zeros(out_dim);

        let zip = Zip::from(out.outer_iter_mut())
            .and(argmax.outer_iter_mut())
            .and(x.outer_iter());

        match ctx.device() {
            Device::Cpu => zip.for_each(|out, argmax, x| pool(k, x, out, argmax)),
            Device::Parallel => zip.par_for_each(|out, argmax, x| pool(k, x, out, argmax)),
        }

        self.cache = ctx.tracks_grad().then_some(((h, w), argmax));

        Ok(out.into_dyn())
    }

    pub fn backward(&mut self, ctx: &Context, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let d = d.into_dimensionality::<Ix4>()?;
        let ((h, w), argmax) = self
            .cache
            .take()
            .ok_or(MlErr::MissingForwardCache { layer: "max_pool2d" })?;

        if d.dim() != argmax.dim() {
            return Err(MlErr::SizeMismatch {
                what: "max pool output gradient",
                got: d.len(),
                expected: argmax.len(),
            });
        }

        let (n, c, _, _) = d.dim();
        let mut dx = Array4::zeros((n, c, h, w));

        let zip = Zip::from(dx.outer_iter_mut())
            .and(d.outer_iter())
            .and(argmax.outer_iter());

        match ctx.device() {
            Device::Cpu => zip.for_each(|dx, d, argmax| unpool(w, d, argmax, dx)),
            Device::Parallel => zip.par_for_each(|dx, d, argmax| unpool(w, d, argmax, dx)),
        }

        Ok(dx.into_dyn())
    }
}

/// Pools a single sample, recording where each maximum came from as `row * width + col`.
fn pool(k: usize, x: ArrayView3<f32>, mut out: ArrayViewMut3<f32>, mut argmax: ArrayViewMut3<usize>) {
    let (c, oh, ow) = out.dim();
    let w = x.dim().2;

    for ci in 0..c {
        for oy in 0..oh {
            for ox in 0..ow {
                let (mut best, mut best_at) = (f32::NEG_INFINITY, oy * k * w + ox * k);

                for ky in 0..k {
                    for kx in 0..k {
                        let (iy, ix) = (oy * k + ky, ox * k + kx);
                        let v = x[[ci, iy, ix]];

                        // The first NaN of a window wins so it reaches the loss.
                        if v > best || (v.is_nan() && !best.is_nan()) {
                            best = v;
                            best_at = iy * w + ix;
                        }
                    }
                }

                out[[ci, oy, ox]] = best;
                argmax[[ci, oy, ox]] = best_at;
            }
        }
    }
}

fn unpool(w: usize, d: ArrayView3<f32>, argmax: ArrayView3<usize>, mut dx: ArrayViewMut3<f32>) {
    Zip::indexed(d).and(argmax).for_each(|(ci, _, _), &d, &at| {
        dx[[ci, at / w, at % w]] += d;
    });
}
