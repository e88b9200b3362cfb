#![allow(dead_code)]

use deblur_core::tensor::{image_to_tensor, kernel_to_tensor, Tensor};
use ndarray::Array2;

/// Wrap a plane into a (1,1,H,W) measurement/image tensor.
pub fn as_image(plane: Array2<f32>) -> Tensor {
    image_to_tensor(plane)
}

/// Wrap a plane into a (1,1,Kh,Kw) kernel tensor.
pub fn as_kernel(plane: Array2<f32>) -> Tensor {
    kernel_to_tensor(plane)
}

/// Kernel with all mass at the center cell.
pub fn impulse(size: usize) -> Array2<f32> {
    let mut k = Array2::<f32>::zeros((size, size));
    k[[size / 2, size / 2]] = 1.0;
    k
}

/// Uniform box kernel normalized to sum 1.
pub fn uniform_box(size: usize) -> Array2<f32> {
    Array2::from_elem((size, size), 1.0 / (size * size) as f32)
}

/// Central-difference numerical gradient of a scalar function of a plane.
///
/// The denominator uses the actually-stored f32 perturbations, so float
/// representation error does not leak into the estimate.
pub fn finite_diff<F>(f: F, at: &Array2<f32>, eps: f32) -> Array2<f32>
where
    F: Fn(&Array2<f32>) -> f64,
{
    let mut grad = Array2::<f32>::zeros(at.dim());
    let (h, w) = at.dim();
    for row in 0..h {
        for col in 0..w {
            let mut plus = at.clone();
            plus[[row, col]] += eps;
            let mut minus = at.clone();
            minus[[row, col]] -= eps;
            let delta = (plus[[row, col]] - minus[[row, col]]) as f64;
            grad[[row, col]] = ((f(&plus) - f(&minus)) / delta) as f32;
        }
    }
    grad
}

/// Assert elementwise closeness of an analytic gradient to its numerical
/// estimate with a mixed absolute/relative tolerance.
pub fn assert_grad_close(analytic: &Array2<f32>, numeric: &Array2<f32>, abs_tol: f64, rel_tol: f64) {
    assert_eq!(analytic.dim(), numeric.dim());
    for ((row, col), &a) in analytic.indexed_iter() {
        let n = numeric[[row, col]];
        let diff = (a as f64 - n as f64).abs();
        let scale = (a as f64).abs().max((n as f64).abs());
        assert!(
            diff <= abs_tol + rel_tol * scale,
            "gradient mismatch at [{row},{col}]: analytic {a}, numeric {n}"
        );
    }
}
