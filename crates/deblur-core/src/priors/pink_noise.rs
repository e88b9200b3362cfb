//! Pink-noise spectral prior.
//!
//! Natural images show a ~1/f^alpha power spectrum. Weighting spectral
//! energy by f^alpha therefore penalizes noise-like high-frequency content
//! while leaving a natural falloff nearly free.

use ndarray::{Array2, ArrayView2};
use num_complex::Complex;

use super::{linspace, TermEval};
use crate::fft;

pub const DEFAULT_ALPHA: f64 = 1.0;

/// Frequency weights f^alpha on the centered (shifted) spectral grid, with
/// the radial frequency normalized so Nyquist sits at 0.5.
fn frequency_weights(h: usize, w: usize, alpha: f64) -> Array2<f64> {
    let fy = linspace(-0.5, 0.5, h);
    let fx = linspace(-0.5, 0.5, w);
    let mut weights = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let f = (fx[col] * fx[col] + fy[row] * fy[row]).sqrt() + 1e-8;
            weights[[row, col]] = f.powf(alpha);
        }
    }
    weights
}

pub fn pink_noise_value(x: &ArrayView2<f32>, alpha: f64) -> f64 {
    pink_noise_impl(x, alpha, false).0
}

/// Weighted spectral energy of the image under an orthonormal FFT, averaged
/// over all frequencies, with gradient (2/n) Re(IFFT(w . FFT(x))).
pub fn pink_noise(x: &ArrayView2<f32>, alpha: f64) -> TermEval {
    let (value, grad) = pink_noise_impl(x, alpha, true);
    TermEval {
        value,
        grad: grad.expect("gradient requested"),
    }
}

fn pink_noise_impl(x: &ArrayView2<f32>, alpha: f64, with_grad: bool) -> (f64, Option<Array2<f32>>) {
    let (h, w) = x.dim();
    let n = (h * w) as f64;

    let spectrum = fft::fft2d(&x.mapv(f64::from));
    // Weights are built on the centered grid, then unshifted to match the
    // raw FFT layout.
    let weights = fft::ifftshift(&frequency_weights(h, w, alpha));

    // Orthonormal |X|^2 is |F|^2 / n; averaging over all frequencies gives
    // another 1/n.
    let mut value = 0.0;
    for row in 0..h {
        for col in 0..w {
            value += weights[[row, col]] * spectrum[[row, col]].norm_sqr();
        }
    }
    value /= n * n;

    if !with_grad {
        return (value, None);
    }

    let mut weighted = spectrum;
    for row in 0..h {
        for col in 0..w {
            weighted[[row, col]] *= Complex::new(weights[[row, col]], 0.0);
        }
    }
    let back = fft::ifft2d(&weighted);
    let grad = back.mapv(|v| (2.0 * v / n) as f32);
    (value, Some(grad))
}
