//! Adam: moment-based adaptive per-parameter gradient steps.
//!
//! Each optimization variable owns an independent `Adam` instance, so the
//! image and kernel estimates keep separate moment accumulators and
//! learning rates. The data term's gradient magnitudes for the two
//! variables differ by orders of magnitude; a shared fixed step would make
//! one of them diverge or stall.

use ndarray::{Array2, ArrayView2};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPS: f64 = 1e-8;

pub struct Adam {
    lr: f64,
    step: u64,
    m: Array2<f64>,
    v: Array2<f64>,
}

impl Adam {
    pub fn new(lr: f32, shape: (usize, usize)) -> Self {
        Self {
            lr: lr as f64,
            step: 0,
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
        }
    }

    /// One bias-corrected update of `param` from `grad`.
    pub fn step(&mut self, param: &mut Array2<f32>, grad: &ArrayView2<f32>) {
        self.step += 1;
        let bc1 = 1.0 - BETA1.powi(self.step as i32);
        let bc2 = 1.0 - BETA2.powi(self.step as i32);

        for ((p, g), (m, v)) in param
            .iter_mut()
            .zip(grad.iter())
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            let g = *g as f64;
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *p -= (self.lr * m_hat / (v_hat.sqrt() + EPS)) as f32;
        }
    }
}
