//! Alternating projected-gradient MAP estimator.
//!
//! The solver owns the two optimization variables (image estimate, kernel
//! estimate) and moves through Uninitialized -> Initialized -> Iterating ->
//! Terminated. Each step computes the composite objective and its joint
//! gradients, applies one Adam update per variable, projects the kernel
//! (non-negative, sum 1) and the image (box [0,1]), records the total loss,
//! and reports the named breakdown to an optional observer at the
//! configured cadence and on the final step. The fixed iteration count is
//! the sole stopping rule.

use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{DeblurError, Result};
use crate::objective::{LossBreakdown, MapObjective, ObjectiveWeights};
use crate::optim::Adam;
use crate::priors::diffusion::{ScoreModel, DEFAULT_TIMESTEP};
use crate::priors::image::ImagePrior;
use crate::priors::pink_noise::DEFAULT_ALPHA;
use crate::psf;
use crate::tensor::{self, Tensor};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Fixed iteration budget; the only termination condition.
    pub num_iters: usize,
    /// Learning rate for the image estimate.
    pub lr_x: f32,
    /// Learning rate for the kernel estimate.
    pub lr_k: f32,
    /// Weight of the pluggable image prior.
    pub lambda_x: f64,
    /// Weight of the kernel L2 energy prior.
    pub lambda_k_l2: f64,
    /// Weight of the kernel center-of-mass prior.
    pub lambda_k_center: f64,
    /// Weight of the kernel autocorrelation prior.
    pub lambda_k_auto: f64,
    /// Weight of the pink-noise spectral prior.
    pub lambda_pink: f64,
    /// Weight of the diffusion score prior.
    pub lambda_diffusion: f64,
    /// Spatial size of the (square, odd) kernel estimate.
    pub kernel_size: usize,
    /// Spectral exponent of the pink-noise prior.
    pub pink_alpha: f64,
    /// Noise timestep index for the diffusion prior.
    pub diffusion_t_index: usize,
    /// Observer cadence in iterations; 0 disables reporting.
    pub log_every: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            num_iters: 500,
            lr_x: 1e-2,
            lr_k: 1e-2,
            lambda_x: 0.0,
            lambda_k_l2: 1e-3,
            lambda_k_center: 1e-3,
            lambda_k_auto: 0.0,
            lambda_pink: 0.0,
            lambda_diffusion: 0.0,
            kernel_size: 15,
            pink_alpha: DEFAULT_ALPHA,
            diffusion_t_index: DEFAULT_TIMESTEP,
            log_every: 10,
        }
    }
}

impl SolverConfig {
    fn weights(&self) -> ObjectiveWeights {
        ObjectiveWeights {
            lambda_x: self.lambda_x,
            lambda_k_l2: self.lambda_k_l2,
            lambda_k_center: self.lambda_k_center,
            lambda_k_auto: self.lambda_k_auto,
            lambda_pink: self.lambda_pink,
            lambda_diffusion: self.lambda_diffusion,
        }
    }
}

/// Final estimates and the per-iteration loss trajectory.
#[derive(Clone, Debug)]
pub struct Estimate {
    /// Estimated sharp image, (1, 1, H, W).
    pub image: Tensor,
    /// Estimated PSF, (1, 1, kernel_size, kernel_size).
    pub kernel: Tensor,
    /// One total-loss value per iteration.
    pub losses: Vec<f64>,
}

pub struct Solver {
    config: SolverConfig,
    image_prior: Option<Box<dyn ImagePrior>>,
    score_model: Option<Arc<dyn ScoreModel>>,
    x: Option<Array2<f32>>,
    k: Option<Array2<f32>>,
}

impl Solver {
    /// Rejects an even or zero kernel size before any state exists.
    pub fn new(config: SolverConfig) -> Result<Self> {
        if config.kernel_size == 0 || config.kernel_size % 2 == 0 {
            return Err(DeblurError::InvalidKernelSize {
                size: config.kernel_size,
            });
        }
        Ok(Self {
            config,
            image_prior: None,
            score_model: None,
            x: None,
            k: None,
        })
    }

    /// Attach a pluggable image prior (weighted by lambda_x).
    pub fn with_image_prior(mut self, prior: Box<dyn ImagePrior>) -> Self {
        self.image_prior = Some(prior);
        self
    }

    /// Attach a shared score model handle for the diffusion prior.
    pub fn with_score_model(mut self, model: Arc<dyn ScoreModel>) -> Self {
        self.score_model = Some(model);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.x.is_some()
    }

    /// Initialize the estimates from a measurement.
    ///
    /// The image warm start is the blurred measurement itself clipped into
    /// [0,1] (a reasonable zeroth-order guess at the sharp image); the
    /// kernel starts as a length-1 motion blur, i.e. an impulse, so early
    /// iterations behave like denoising before kernel structure is learned.
    pub fn initialize(&mut self, y_meas: &Tensor) -> Result<()> {
        tensor::validate_measurement(y_meas)?;
        if self.config.lambda_diffusion != 0.0 && self.score_model.is_none() {
            return Err(DeblurError::MissingScoreModel {
                weight: self.config.lambda_diffusion,
            });
        }

        let x_init = tensor::plane(y_meas).mapv(|v| v.clamp(0.0, 1.0));
        let k_init = psf::motion(self.config.kernel_size, Some(1), 0.0)?;

        self.x = Some(x_init);
        self.k = Some(k_init);
        Ok(())
    }

    /// Run the configured number of iterations against `y_meas`.
    pub fn run(&mut self, y_meas: &Tensor) -> Result<Estimate> {
        self.run_observed(y_meas, |_, _| {})
    }

    /// [`Solver::run`] with an observer receiving the named loss breakdown
    /// and the iteration index. The callback is invoked synchronously every
    /// `log_every` iterations and on the final one; it cannot mutate solver
    /// state and must return before the loop proceeds.
    pub fn run_observed<F>(&mut self, y_meas: &Tensor, mut observer: F) -> Result<Estimate>
    where
        F: FnMut(&LossBreakdown, usize),
    {
        self.initialize(y_meas)?;
        let y_plane = tensor::plane(y_meas).to_owned();

        let mut x = self.x.take().expect("initialized image estimate");
        let mut k = self.k.take().expect("initialized kernel estimate");

        let mut objective =
            MapObjective::new(self.config.weights()).with_pink_alpha(self.config.pink_alpha);
        if let Some(prior) = self.image_prior.as_deref() {
            objective = objective.with_image_prior(prior);
        }
        if let Some(model) = &self.score_model {
            objective = objective.with_score_model(model.as_ref(), self.config.diffusion_t_index);
        }

        let mut adam_x = Adam::new(self.config.lr_x, x.dim());
        let mut adam_k = Adam::new(self.config.lr_k, k.dim());

        let num_iters = self.config.num_iters;
        let log_every = self.config.log_every;
        let mut losses = Vec::with_capacity(num_iters);

        for it in 0..num_iters {
            let eval = objective.evaluate_planes(&x.view(), &k.view(), &y_plane.view())?;

            adam_x.step(&mut x, &eval.grad_x.view());
            adam_k.step(&mut k, &eval.grad_k.view());

            project_kernel(&mut k);
            project_image(&mut x);

            losses.push(eval.breakdown.total);
            trace!(iter = it, loss = eval.breakdown.total, "solver step");

            if log_every > 0 && (it % log_every == 0 || it + 1 == num_iters) {
                observer(&eval.breakdown, it);
            }
        }

        if let Some(&last) = losses.last() {
            debug!(iterations = num_iters, final_loss = last, "solver finished");
        }

        let estimate = Estimate {
            image: tensor::image_to_tensor(x.clone()),
            kernel: tensor::kernel_to_tensor(k.clone()),
            losses,
        };
        self.x = Some(x);
        self.k = Some(k);
        Ok(estimate)
    }
}

/// Kernel constraint projection: clamp to non-negative, then renormalize to
/// sum 1 with an epsilon-guarded denominator.
pub fn project_kernel(k: &mut Array2<f32>) {
    k.mapv_inplace(|v| v.max(0.0));
    let sum: f64 = k.iter().map(|&v| v as f64).sum();
    let inv = 1.0 / (sum + 1e-8);
    k.mapv_inplace(|v| (v as f64 * inv) as f32);
}

/// Image constraint projection: box-clamp into [0, 1].
pub fn project_image(x: &mut Array2<f32>) {
    x.mapv_inplace(|v| v.clamp(0.0, 1.0));
}
