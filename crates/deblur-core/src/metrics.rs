//! Reconstruction-quality metrics for evaluating solver outputs.
//!
//! These consume the core's outputs; they are not part of the estimation
//! engine's contract.

use crate::error::{DeblurError, Result};
use crate::tensor::{plane, Tensor};

/// Classical SSIM window size.
const SSIM_WINDOW: usize = 11;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

fn check_same_shape(a: &Tensor, b: &Tensor) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(DeblurError::ShapeMismatch {
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        });
    }
    Ok(())
}

/// Peak signal-to-noise ratio in dB; infinite for identical inputs.
pub fn psnr(x_hat: &Tensor, x_true: &Tensor, data_range: f64) -> Result<f64> {
    check_same_shape(x_hat, x_true)?;
    let n = x_hat.len() as f64;
    let mse = x_hat
        .iter()
        .zip(x_true.iter())
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum::<f64>()
        / n;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(20.0 * data_range.log10() - 10.0 * mse.log10())
}

/// Mean structural similarity over sliding 11x11 windows.
pub fn ssim(x_hat: &Tensor, x_true: &Tensor, data_range: f64) -> Result<f64> {
    check_same_shape(x_hat, x_true)?;
    let a = plane(x_hat);
    let b = plane(x_true);
    let (h, w) = a.dim();
    if h < SSIM_WINDOW || w < SSIM_WINDOW {
        return Err(DeblurError::ShapeMismatch {
            expected: vec![SSIM_WINDOW, SSIM_WINDOW],
            got: vec![h, w],
        });
    }

    let c1 = (SSIM_K1 * data_range).powi(2);
    let c2 = (SSIM_K2 * data_range).powi(2);
    let n_win = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    // Unbiased covariance normalization, matching the classical definition.
    let cov_norm = n_win / (n_win - 1.0);

    let mut total = 0.0;
    let mut count = 0usize;
    for top in 0..=(h - SSIM_WINDOW) {
        for left in 0..=(w - SSIM_WINDOW) {
            let mut sum_a = 0.0;
            let mut sum_b = 0.0;
            let mut sum_aa = 0.0;
            let mut sum_bb = 0.0;
            let mut sum_ab = 0.0;
            for row in top..top + SSIM_WINDOW {
                for col in left..left + SSIM_WINDOW {
                    let va = a[[row, col]] as f64;
                    let vb = b[[row, col]] as f64;
                    sum_a += va;
                    sum_b += vb;
                    sum_aa += va * va;
                    sum_bb += vb * vb;
                    sum_ab += va * vb;
                }
            }
            let mu_a = sum_a / n_win;
            let mu_b = sum_b / n_win;
            let var_a = cov_norm * (sum_aa / n_win - mu_a * mu_a);
            let var_b = cov_norm * (sum_bb / n_win - mu_b * mu_b);
            let cov = cov_norm * (sum_ab / n_win - mu_a * mu_b);

            let numerator = (2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            total += numerator / denominator;
            count += 1;
        }
    }
    Ok(total / count as f64)
}

/// L2 distance between an estimated kernel and the ground truth.
pub fn kernel_error(k_hat: &Tensor, k_true: &Tensor) -> Result<f64> {
    check_same_shape(k_hat, k_true)?;
    let sum = k_hat
        .iter()
        .zip(k_true.iter())
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum::<f64>();
    Ok(sum.sqrt())
}
