//! Kernel regularizers: L2 energy, center-of-mass compactness, and
//! autocorrelation sidelobe suppression.

use ndarray::{Array2, ArrayView2};
use num_complex::Complex;

use super::{linspace, TermEval};
use crate::fft;

/// Mean of squared kernel entries; penalizes diffuse, high-energy kernels.
pub fn l2_value(k: &ArrayView2<f32>) -> f64 {
    let n = k.len() as f64;
    k.iter().map(|&v| v as f64 * v as f64).sum::<f64>() / n
}

pub fn l2(k: &ArrayView2<f32>) -> TermEval {
    let n = k.len() as f64;
    TermEval {
        value: l2_value(k),
        grad: k.mapv(|v| (2.0 * v as f64 / n) as f32),
    }
}

/// Weighted average of squared radius over the kernel support, with
/// normalized |k| as weights; penalizes mass far from the kernel center.
///
/// The grid spans [-1, 1] per axis and the weight denominator carries a
/// small epsilon so an all-zero kernel evaluates to zero instead of NaN.
pub fn center_of_mass(k: &ArrayView2<f32>) -> TermEval {
    let (value, grad) = center_of_mass_impl(k, true);
    TermEval {
        value,
        grad: grad.expect("gradient requested"),
    }
}

pub fn center_of_mass_value(k: &ArrayView2<f32>) -> f64 {
    center_of_mass_impl(k, false).0
}

fn center_of_mass_impl(k: &ArrayView2<f32>, with_grad: bool) -> (f64, Option<Array2<f32>>) {
    let (kh, kw) = k.dim();
    let ys = linspace(-1.0, 1.0, kh);
    let xs = linspace(-1.0, 1.0, kw);

    let mut weight_sum = 1e-8;
    let mut radius_sum = 0.0;
    for row in 0..kh {
        for col in 0..kw {
            let wgt = k[[row, col]].abs() as f64;
            let r2 = xs[col] * xs[col] + ys[row] * ys[row];
            weight_sum += wgt;
            radius_sum += wgt * r2;
        }
    }
    let value = radius_sum / weight_sum;

    if !with_grad {
        return (value, None);
    }

    // d/dk |k|*r2 / sum(|k|) = sign(k) * (r2 - value) / sum(|k|)
    let mut grad = Array2::<f32>::zeros((kh, kw));
    for row in 0..kh {
        for col in 0..kw {
            let sign = match k[[row, col]] {
                v if v > 0.0 => 1.0,
                v if v < 0.0 => -1.0,
                _ => 0.0,
            };
            let r2 = xs[col] * xs[col] + ys[row] * ys[row];
            grad[[row, col]] = (sign * (r2 - value) / weight_sum) as f32;
        }
    }
    (value, Some(grad))
}

/// Mean squared off-center autocorrelation of the kernel.
///
/// The kernel's power spectrum is inverse-transformed to its circular
/// spatial autocorrelation, the zero-lag sample is centered and zeroed, and
/// the mean of the remaining squared values is returned. A pure impulse
/// scores zero; spatially extended kernels score strictly positive, so this
/// favors more-invertible blurs.
pub fn autocorrelation(k: &ArrayView2<f32>) -> TermEval {
    let (value, grad) = autocorrelation_impl(k, true);
    TermEval {
        value,
        grad: grad.expect("gradient requested"),
    }
}

pub fn autocorrelation_value(k: &ArrayView2<f32>) -> f64 {
    autocorrelation_impl(k, false).0
}

fn autocorrelation_impl(k: &ArrayView2<f32>, with_grad: bool) -> (f64, Option<Array2<f32>>) {
    let (kh, kw) = k.dim();
    let n = (kh * kw) as f64;

    let spectrum = fft::fft2d(&k.mapv(f64::from));
    let power = spectrum.mapv(|v| Complex::new(v.norm_sqr(), 0.0));
    let auto = fft::ifft2d(&power);

    let mut centered = fft::fftshift(&auto);
    centered[[kh / 2, kw / 2]] = 0.0;
    let value = centered.iter().map(|v| v * v).sum::<f64>() / n;

    if !with_grad {
        return (value, None);
    }

    // Gradient of the quadratic form: 4/n times the circular correlation of
    // the zero-lag-suppressed autocorrelation with the kernel.
    let mut suppressed = auto;
    suppressed[[0, 0]] = 0.0;
    let sup_spectrum = fft::fft2d(&suppressed);
    let mut product = sup_spectrum;
    for row in 0..kh {
        for col in 0..kw {
            product[[row, col]] *= spectrum[[row, col]];
        }
    }
    let corr = fft::ifft2d(&product);
    let grad = corr.mapv(|v| (4.0 * v / n) as f32);
    (value, Some(grad))
}
