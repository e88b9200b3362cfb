//! Regularization terms of the MAP objective.
//!
//! Every term is a pure scalar-valued function of one variable (the image
//! or the kernel) and supplies its analytic gradient with respect to that
//! variable alongside the value.

pub mod diffusion;
pub mod image;
pub mod kernel;
pub mod pink_noise;

use ndarray::Array2;

/// Scalar penalty together with its gradient.
#[derive(Clone, Debug)]
pub struct TermEval {
    pub value: f64,
    pub grad: Array2<f32>,
}

/// `n` evenly spaced values covering [start, end] inclusive.
pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + i as f64 * step).collect()
}
