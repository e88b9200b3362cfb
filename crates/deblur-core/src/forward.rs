//! Differentiable forward imaging model: y = k * x + noise.
//!
//! `convolve` is a 2D correlation with "same"-size output, padding by
//! Kh/2 and Kw/2 on each side. Kernel dimensions must be odd for exact
//! centering; even dimensions shift the output by one pixel and callers
//! must not rely on that case.

use ndarray::{s, Array2, Array4, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::Result;
use crate::tensor::{validate_image, validate_kernel, Tensor};

/// Minimum pixel count (h*w) to justify row-level parallelism.
const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Correlate image x with PSF k under "same" output-size semantics.
///
/// x: (B, 1, H, W), k: (1, 1, Kh, Kw). Returns (B, 1, H, W).
pub fn convolve(x: &Tensor, k: &Tensor) -> Result<Tensor> {
    validate_image(x)?;
    validate_kernel(k)?;

    let (batch, _, h, w) = x.dim();
    let mut out = Array4::<f32>::zeros((batch, 1, h, w));
    let kernel = k.slice(s![0, 0, .., ..]);
    for b in 0..batch {
        let plane = correlate_same(&x.slice(s![b, 0, .., ..]), &kernel);
        out.slice_mut(s![b, 0, .., ..]).assign(&plane);
    }
    Ok(out)
}

/// Add i.i.d. zero-mean Gaussian noise of standard deviation `sigma`.
///
/// A sigma of zero (or below) is a byte-identical pass-through, not noise of
/// magnitude zero, so noiseless simulation stays deterministic.
pub fn add_noise(y: &Tensor, sigma: f32) -> Tensor {
    add_noise_with(y, sigma, &mut rand::rng())
}

/// [`add_noise`] drawing from a caller-supplied RNG for reproducibility.
pub fn add_noise_with<R: Rng + ?Sized>(y: &Tensor, sigma: f32, rng: &mut R) -> Tensor {
    if sigma <= 0.0 {
        return y.clone();
    }
    let normal = Normal::new(0.0f32, sigma).expect("standard deviation is positive and finite");
    y.mapv(|v| v + normal.sample(rng))
}

/// Full forward model: convolution followed by optional Gaussian noise.
pub fn simulate(x: &Tensor, k: &Tensor, noise_sigma: f32) -> Result<Tensor> {
    let y = convolve(x, k)?;
    Ok(add_noise(&y, noise_sigma))
}

/// [`simulate`] drawing noise from a caller-supplied RNG.
pub fn simulate_with<R: Rng + ?Sized>(
    x: &Tensor,
    k: &Tensor,
    noise_sigma: f32,
    rng: &mut R,
) -> Result<Tensor> {
    let y = convolve(x, k)?;
    Ok(add_noise_with(&y, noise_sigma, rng))
}

/// Same-size zero-padded correlation of a single plane with a kernel.
pub fn correlate_same(x: &ArrayView2<f32>, k: &ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = x.dim();
    let (kh, kw) = k.dim();
    let ph = (kh / 2) as isize;
    let pw = (kw / 2) as isize;

    let compute_row = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f64;
                for u in 0..kh {
                    let src_row = row as isize + u as isize - ph;
                    if src_row < 0 || src_row >= h as isize {
                        continue;
                    }
                    for v in 0..kw {
                        let src_col = col as isize + v as isize - pw;
                        if src_col < 0 || src_col >= w as isize {
                            continue;
                        }
                        sum += k[[u, v]] as f64 * x[[src_row as usize, src_col as usize]] as f64;
                    }
                }
                sum as f32
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        use rayon::prelude::*;
        (0..h).into_par_iter().map(compute_row).collect()
    } else {
        (0..h).map(compute_row).collect()
    };

    let mut out = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            out[[row, col]] = val;
        }
    }
    out
}

/// Adjoint of [`correlate_same`] with respect to the image.
///
/// g[p,q] = sum_{u,v} k[u,v] * r[p-u+ph, q-v+pw], with r zero outside its
/// support. This is the same-size convolution of the residual with the
/// (unflipped) kernel.
pub(crate) fn correlate_adjoint_image(r: &ArrayView2<f32>, k: &ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = r.dim();
    let (kh, kw) = k.dim();
    let ph = (kh / 2) as isize;
    let pw = (kw / 2) as isize;

    let mut out = Array2::<f32>::zeros((h, w));
    for p in 0..h {
        for q in 0..w {
            let mut sum = 0.0f64;
            for u in 0..kh {
                let src_row = p as isize - u as isize + ph;
                if src_row < 0 || src_row >= h as isize {
                    continue;
                }
                for v in 0..kw {
                    let src_col = q as isize - v as isize + pw;
                    if src_col < 0 || src_col >= w as isize {
                        continue;
                    }
                    sum += k[[u, v]] as f64 * r[[src_row as usize, src_col as usize]] as f64;
                }
            }
            out[[p, q]] = sum as f32;
        }
    }
    out
}

/// Adjoint of [`correlate_same`] with respect to the kernel.
///
/// g[u,v] = sum_{i,j} r[i,j] * x[i+u-ph, j+v-pw]: the cross-correlation of
/// the image with the residual restricted to kernel-sized lags.
pub(crate) fn correlate_adjoint_kernel(
    x: &ArrayView2<f32>,
    r: &ArrayView2<f32>,
    kh: usize,
    kw: usize,
) -> Array2<f32> {
    let (h, w) = x.dim();
    let ph = (kh / 2) as isize;
    let pw = (kw / 2) as isize;

    let mut out = Array2::<f32>::zeros((kh, kw));
    for u in 0..kh {
        for v in 0..kw {
            let dy = u as isize - ph;
            let dx = v as isize - pw;
            let mut sum = 0.0f64;
            for i in 0..h {
                let src_row = i as isize + dy;
                if src_row < 0 || src_row >= h as isize {
                    continue;
                }
                for j in 0..w {
                    let src_col = j as isize + dx;
                    if src_col < 0 || src_col >= w as isize {
                        continue;
                    }
                    sum += r[[i, j]] as f64 * x[[src_row as usize, src_col as usize]] as f64;
                }
            }
            out[[u, v]] = sum as f32;
        }
    }
    out
}
