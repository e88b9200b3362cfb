//! Composite MAP objective for blind deconvolution.
//!
//! L(x, k) = ||y - k * x||^2
//!           + lambda_x * Phi(x)
//!           + lambda_k_l2 * mean(k^2)
//!           + lambda_k_center * CoM(k)
//!           + lambda_k_auto * Auto(k)
//!           + lambda_pink * Pink(x)
//!           + lambda_diffusion * Diff(x)
//!
//! The data term always scores the noiseless forward simulation: noise
//! injection exists to generate synthetic measurements, never to score a
//! candidate solution. A zero weight skips its term entirely, so it
//! contributes exactly zero with no numerical noise.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{DeblurError, Result};
use crate::forward::{correlate_adjoint_image, correlate_adjoint_kernel, correlate_same};
use crate::priors::diffusion::{self, ScoreModel, DEFAULT_TIMESTEP};
use crate::priors::image::ImagePrior;
use crate::priors::pink_noise::{self, DEFAULT_ALPHA};
use crate::priors::{kernel as kernel_priors, TermEval};
use crate::tensor::{plane, validate_kernel, validate_measurement, Tensor};

/// Per-prior weight scalars of the MAP objective.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub lambda_x: f64,
    pub lambda_k_l2: f64,
    pub lambda_k_center: f64,
    pub lambda_k_auto: f64,
    pub lambda_pink: f64,
    pub lambda_diffusion: f64,
}

/// Weighted per-term loss values under stable names; observability only.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossBreakdown {
    pub total: f64,
    pub data: f64,
    pub kernel_l2: f64,
    pub kernel_center: f64,
    pub kernel_autocorr: f64,
    pub image_prior: f64,
    pub pink_noise: f64,
    pub diffusion: f64,
}

impl LossBreakdown {
    /// Named metrics for observer callbacks; the total is reported as
    /// "loss", components under their term names.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("loss", self.total),
            ("data", self.data),
            ("kernel_l2", self.kernel_l2),
            ("kernel_center", self.kernel_center),
            ("kernel_autocorr", self.kernel_autocorr),
            ("image_prior", self.image_prior),
            ("pink_noise", self.pink_noise),
            ("diffusion", self.diffusion),
        ]
    }
}

/// One full evaluation: loss breakdown plus joint gradients for both
/// variables, assembled from a single pass.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub breakdown: LossBreakdown,
    pub grad_x: Array2<f32>,
    pub grad_k: Array2<f32>,
}

/// The MAP objective with its weights and optional prior collaborators.
pub struct MapObjective<'a> {
    weights: ObjectiveWeights,
    pink_alpha: f64,
    t_index: usize,
    image_prior: Option<&'a dyn ImagePrior>,
    score_model: Option<&'a dyn ScoreModel>,
}

impl<'a> MapObjective<'a> {
    pub fn new(weights: ObjectiveWeights) -> Self {
        Self {
            weights,
            pink_alpha: DEFAULT_ALPHA,
            t_index: DEFAULT_TIMESTEP,
            image_prior: None,
            score_model: None,
        }
    }

    pub fn with_pink_alpha(mut self, alpha: f64) -> Self {
        self.pink_alpha = alpha;
        self
    }

    pub fn with_image_prior(mut self, prior: &'a dyn ImagePrior) -> Self {
        self.image_prior = Some(prior);
        self
    }

    pub fn with_score_model(mut self, model: &'a dyn ScoreModel, t_index: usize) -> Self {
        self.score_model = Some(model);
        self.t_index = t_index;
        self
    }

    /// A positive diffusion weight needs a score model handle; everything
    /// else is optional.
    pub fn validate(&self) -> Result<()> {
        if self.weights.lambda_diffusion != 0.0 && self.score_model.is_none() {
            return Err(DeblurError::MissingScoreModel {
                weight: self.weights.lambda_diffusion,
            });
        }
        Ok(())
    }

    /// Total loss at (x, k) against the measurement y.
    pub fn value(&self, x: &Tensor, k: &Tensor, y: &Tensor) -> Result<f64> {
        Ok(self.with_components(x, k, y)?.0)
    }

    /// Total loss plus the named per-term breakdown. The breakdown is an
    /// auxiliary view; it never changes the total.
    pub fn with_components(&self, x: &Tensor, k: &Tensor, y: &Tensor) -> Result<(f64, LossBreakdown)> {
        self.check_shapes(x, k, y)?;
        let breakdown = self.components_planes(&plane(x), &plane(k), &plane(y))?;
        Ok((breakdown.total, breakdown))
    }

    /// Loss breakdown and joint gradients with respect to x and k.
    pub fn evaluate(&self, x: &Tensor, k: &Tensor, y: &Tensor) -> Result<Evaluation> {
        self.check_shapes(x, k, y)?;
        self.evaluate_planes(&plane(x), &plane(k), &plane(y))
    }

    fn check_shapes(&self, x: &Tensor, k: &Tensor, y: &Tensor) -> Result<()> {
        self.validate()?;
        validate_measurement(x)?;
        validate_kernel(k)?;
        validate_measurement(y)?;
        if x.shape() != y.shape() {
            return Err(DeblurError::ShapeMismatch {
                expected: x.shape().to_vec(),
                got: y.shape().to_vec(),
            });
        }
        Ok(())
    }

    fn components_planes(
        &self,
        x: &ArrayView2<f32>,
        k: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> Result<LossBreakdown> {
        let w = &self.weights;
        let mut out = LossBreakdown::default();

        let y_pred = correlate_same(x, k);
        let n = y_pred.len() as f64;
        out.data = y_pred
            .iter()
            .zip(y.iter())
            .map(|(&p, &m)| {
                let d = p as f64 - m as f64;
                d * d
            })
            .sum::<f64>()
            / n;

        if w.lambda_k_l2 != 0.0 {
            out.kernel_l2 = w.lambda_k_l2 * kernel_priors::l2_value(k);
        }
        if w.lambda_k_center != 0.0 {
            out.kernel_center = w.lambda_k_center * kernel_priors::center_of_mass_value(k);
        }
        if w.lambda_k_auto != 0.0 {
            out.kernel_autocorr = w.lambda_k_auto * kernel_priors::autocorrelation_value(k);
        }
        if w.lambda_x != 0.0 {
            if let Some(prior) = self.image_prior {
                out.image_prior = w.lambda_x * prior.value(x)?;
            }
        }
        if w.lambda_pink != 0.0 {
            out.pink_noise = w.lambda_pink * pink_noise::pink_noise_value(x, self.pink_alpha);
        }
        if w.lambda_diffusion != 0.0 {
            if let Some(model) = self.score_model {
                out.diffusion =
                    w.lambda_diffusion * diffusion::diffusion_prior_value(x, model, self.t_index)?;
            }
        }

        out.total = out.data
            + out.kernel_l2
            + out.kernel_center
            + out.kernel_autocorr
            + out.image_prior
            + out.pink_noise
            + out.diffusion;
        Ok(out)
    }

    pub(crate) fn evaluate_planes(
        &self,
        x: &ArrayView2<f32>,
        k: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> Result<Evaluation> {
        let w = &self.weights;
        let (kh, kw) = k.dim();
        let mut breakdown = LossBreakdown::default();

        // Data fidelity and its adjoint-based gradients.
        let y_pred = correlate_same(x, k);
        let n = y_pred.len() as f64;
        let mut residual = y_pred;
        residual.zip_mut_with(y, |p, &m| *p -= m);
        breakdown.data = residual.iter().map(|&d| d as f64 * d as f64).sum::<f64>() / n;

        let scale = (2.0 / n) as f32;
        let mut grad_x = correlate_adjoint_image(&residual.view(), k);
        grad_x.mapv_inplace(|v| v * scale);
        let mut grad_k = correlate_adjoint_kernel(x, &residual.view(), kh, kw);
        grad_k.mapv_inplace(|v| v * scale);

        fn add_term(target: &mut f64, grad: &mut Array2<f32>, weight: f64, term: TermEval) {
            *target = weight * term.value;
            grad.zip_mut_with(&term.grad, |g, &t| *g += (weight * t as f64) as f32);
        }

        if w.lambda_k_l2 != 0.0 {
            add_term(
                &mut breakdown.kernel_l2,
                &mut grad_k,
                w.lambda_k_l2,
                kernel_priors::l2(k),
            );
        }
        if w.lambda_k_center != 0.0 {
            add_term(
                &mut breakdown.kernel_center,
                &mut grad_k,
                w.lambda_k_center,
                kernel_priors::center_of_mass(k),
            );
        }
        if w.lambda_k_auto != 0.0 {
            add_term(
                &mut breakdown.kernel_autocorr,
                &mut grad_k,
                w.lambda_k_auto,
                kernel_priors::autocorrelation(k),
            );
        }
        if w.lambda_x != 0.0 {
            if let Some(prior) = self.image_prior {
                add_term(
                    &mut breakdown.image_prior,
                    &mut grad_x,
                    w.lambda_x,
                    prior.evaluate(x)?,
                );
            }
        }
        if w.lambda_pink != 0.0 {
            add_term(
                &mut breakdown.pink_noise,
                &mut grad_x,
                w.lambda_pink,
                pink_noise::pink_noise(x, self.pink_alpha),
            );
        }
        if w.lambda_diffusion != 0.0 {
            if let Some(model) = self.score_model {
                add_term(
                    &mut breakdown.diffusion,
                    &mut grad_x,
                    w.lambda_diffusion,
                    diffusion::diffusion_prior(x, model, self.t_index)?,
                );
            }
        }

        breakdown.total = breakdown.data
            + breakdown.kernel_l2
            + breakdown.kernel_center
            + breakdown.kernel_autocorr
            + breakdown.image_prior
            + breakdown.pink_noise
            + breakdown.diffusion;

        Ok(Evaluation {
            breakdown,
            grad_x,
            grad_k,
        })
    }
}
