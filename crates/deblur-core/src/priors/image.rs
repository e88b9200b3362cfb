//! Pluggable image prior: the extension point for swapping in learned or
//! analytic priors without touching the solver.
//!
//! A prior scores an image estimate and returns the penalty with its
//! gradient. Absence of a prior (or a zero weight) contributes exactly
//! zero. Built-in variants cover the spectral-shape and learned-score
//! terms; user-defined priors implement the trait directly.

use std::sync::Arc;

use ndarray::ArrayView2;

use super::diffusion::{self, ScoreModel};
use super::pink_noise;
use super::TermEval;
use crate::error::Result;

pub trait ImagePrior {
    /// Score the image estimate. Implementations returning a non-scalar
    /// quantity must reduce it to its mean before returning.
    fn evaluate(&self, x: &ArrayView2<f32>) -> Result<TermEval>;

    fn value(&self, x: &ArrayView2<f32>) -> Result<f64> {
        Ok(self.evaluate(x)?.value)
    }
}

/// 1/f^alpha spectral-shape prior as a pluggable image prior.
#[derive(Clone, Debug)]
pub struct SpectralShapePrior {
    pub alpha: f64,
}

impl Default for SpectralShapePrior {
    fn default() -> Self {
        Self {
            alpha: pink_noise::DEFAULT_ALPHA,
        }
    }
}

impl ImagePrior for SpectralShapePrior {
    fn evaluate(&self, x: &ArrayView2<f32>) -> Result<TermEval> {
        Ok(pink_noise::pink_noise(x, self.alpha))
    }
}

/// Learned score-based prior over a shared pretrained denoiser handle.
#[derive(Clone)]
pub struct LearnedScorePrior {
    model: Arc<dyn ScoreModel>,
    t_index: usize,
}

impl LearnedScorePrior {
    pub fn new(model: Arc<dyn ScoreModel>, t_index: usize) -> Self {
        Self { model, t_index }
    }
}

impl ImagePrior for LearnedScorePrior {
    fn evaluate(&self, x: &ArrayView2<f32>) -> Result<TermEval> {
        diffusion::diffusion_prior(x, self.model.as_ref(), self.t_index)
    }
}
