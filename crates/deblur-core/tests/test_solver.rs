mod common;

use common::as_image;
use deblur_core::error::{DeblurError, Result};
use deblur_core::priors::TermEval;
use deblur_core::solver::{project_image, project_kernel, Solver, SolverConfig};
use deblur_core::synthetic::checkerboard;
use ndarray::{Array2, Array4, ArrayView2};

fn small_config(num_iters: usize) -> SolverConfig {
    SolverConfig {
        num_iters,
        kernel_size: 5,
        ..SolverConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Construction and input contracts
// ---------------------------------------------------------------------------

#[test]
fn even_kernel_size_is_rejected_at_construction() {
    let config = SolverConfig {
        kernel_size: 14,
        ..SolverConfig::default()
    };
    let err = Solver::new(config).unwrap_err();
    match err {
        DeblurError::InvalidKernelSize { size } => assert_eq!(size, 14),
        other => panic!("expected InvalidKernelSize, got {other:?}"),
    }
}

#[test]
fn zero_kernel_size_is_rejected_at_construction() {
    let config = SolverConfig {
        kernel_size: 0,
        ..SolverConfig::default()
    };
    assert!(Solver::new(config).is_err());
}

#[test]
fn batch_size_two_is_rejected_before_any_state_is_created() {
    let y = Array4::<f32>::zeros((2, 1, 16, 16));
    let mut solver = Solver::new(small_config(10)).unwrap();
    let err = solver.run(&y).unwrap_err();
    match err {
        DeblurError::UnsupportedBatch { got } => assert_eq!(got, 2),
        other => panic!("expected UnsupportedBatch, got {other:?}"),
    }
    assert!(!solver.is_initialized());
}

#[test]
fn multichannel_measurement_is_rejected() {
    let y = Array4::<f32>::zeros((1, 3, 16, 16));
    let mut solver = Solver::new(small_config(10)).unwrap();
    let err = solver.run(&y).unwrap_err();
    assert!(matches!(err, DeblurError::InvalidImageShape { .. }));
}

#[test]
fn diffusion_weight_without_model_is_rejected_eagerly() {
    let config = SolverConfig {
        lambda_diffusion: 0.5,
        kernel_size: 5,
        num_iters: 10,
        ..SolverConfig::default()
    };
    let y = as_image(checkerboard(16, 4));
    let mut solver = Solver::new(config).unwrap();
    let err = solver.run(&y).unwrap_err();
    assert!(matches!(err, DeblurError::MissingScoreModel { .. }));
    assert!(!solver.is_initialized());
}

// ---------------------------------------------------------------------------
// Initialization and zero-iteration runs
// ---------------------------------------------------------------------------

#[test]
fn zero_iterations_return_warm_start_and_empty_history() {
    let plane = checkerboard(16, 4).mapv(|v| v * 1.5 - 0.25); // exceeds [0,1]
    let y = as_image(plane.clone());
    let mut solver = Solver::new(small_config(0)).unwrap();
    let estimate = solver.run(&y).unwrap();

    assert!(estimate.losses.is_empty());
    assert_eq!(estimate.image.shape(), y.shape());
    assert_eq!(estimate.kernel.shape(), &[1, 1, 5, 5]);

    // Image warm start is the measurement clipped into [0,1].
    for ((_, _, row, col), &v) in estimate.image.indexed_iter() {
        let expected = plane[[row, col]].clamp(0.0, 1.0);
        assert_eq!(v, expected, "warm start differs at [{row},{col}]");
    }

    // Kernel warm start is an impulse (length-1 motion blur).
    for ((_, _, row, col), &v) in estimate.kernel.indexed_iter() {
        let expected = if row == 2 && col == 2 { 1.0 } else { 0.0 };
        assert!(
            (v - expected).abs() < 1e-6,
            "kernel warm start differs at [{row},{col}]: {v}"
        );
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[test]
fn kernel_projection_enforces_nonnegativity_and_unit_sum() {
    let mut k = Array2::from_shape_vec(
        (3, 3),
        vec![-0.5, 0.2, 0.4, 1.3, -0.1, 0.0, 0.7, 0.2, -2.0],
    )
    .unwrap();
    project_kernel(&mut k);

    assert!(k.iter().all(|&v| v >= 0.0));
    let sum: f64 = k.iter().map(|&v| v as f64).sum();
    assert!((sum - 1.0).abs() < 1e-6, "projected kernel sum = {sum}");
}

#[test]
fn image_projection_clamps_into_unit_box() {
    let mut x = Array2::from_shape_vec((2, 2), vec![-0.3, 0.5, 1.7, 1.0]).unwrap();
    project_image(&mut x);
    assert!(x.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(x[[0, 1]], 0.5);
}

#[test]
fn estimates_satisfy_invariants_after_a_run() {
    let y = as_image(checkerboard(24, 4));
    let mut solver = Solver::new(small_config(30)).unwrap();
    let estimate = solver.run(&y).unwrap();

    assert!(estimate.image.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert!(estimate.kernel.iter().all(|&v| v >= 0.0));
    let sum: f64 = estimate.kernel.iter().map(|&v| v as f64).sum();
    assert!((sum - 1.0).abs() < 1e-6, "kernel sum = {sum}");
    assert_eq!(estimate.losses.len(), 30);
}

// ---------------------------------------------------------------------------
// Observer cadence
// ---------------------------------------------------------------------------

#[test]
fn observer_fires_at_cadence_and_on_final_iteration() {
    let config = SolverConfig {
        num_iters: 25,
        log_every: 10,
        kernel_size: 5,
        ..SolverConfig::default()
    };
    let y = as_image(checkerboard(16, 4));
    let mut solver = Solver::new(config).unwrap();

    let mut seen = Vec::new();
    solver
        .run_observed(&y, |_, iter| seen.push(iter))
        .unwrap();
    assert_eq!(seen, vec![0, 10, 20, 24]);
}

#[test]
fn observer_is_disabled_by_zero_cadence() {
    let config = SolverConfig {
        num_iters: 10,
        log_every: 0,
        kernel_size: 5,
        ..SolverConfig::default()
    };
    let y = as_image(checkerboard(16, 4));
    let mut solver = Solver::new(config).unwrap();

    let mut calls = 0usize;
    solver.run_observed(&y, |_, _| calls += 1).unwrap();
    assert_eq!(calls, 0);
}

#[test]
fn observer_receives_named_breakdown() {
    let config = SolverConfig {
        num_iters: 5,
        log_every: 1,
        kernel_size: 5,
        ..SolverConfig::default()
    };
    let y = as_image(checkerboard(16, 4));
    let mut solver = Solver::new(config).unwrap();

    let mut totals = Vec::new();
    let estimate = solver
        .run_observed(&y, |breakdown, _| {
            let metrics = breakdown.metrics();
            assert_eq!(metrics[0].0, "loss");
            totals.push(breakdown.total);
        })
        .unwrap();
    assert_eq!(totals.len(), 5);
    assert_eq!(totals, estimate.losses);
}

// ---------------------------------------------------------------------------
// Pluggable image prior
// ---------------------------------------------------------------------------

struct ConstantPrior {
    value: f64,
}

impl deblur_core::priors::image::ImagePrior for ConstantPrior {
    fn evaluate(&self, x: &ArrayView2<f32>) -> Result<TermEval> {
        Ok(TermEval {
            value: self.value,
            grad: Array2::zeros(x.dim()),
        })
    }
}

#[test]
fn custom_image_prior_feeds_the_breakdown() {
    let config = SolverConfig {
        num_iters: 3,
        log_every: 1,
        lambda_x: 0.25,
        kernel_size: 5,
        ..SolverConfig::default()
    };
    let y = as_image(checkerboard(16, 4));
    let mut solver = Solver::new(config)
        .unwrap()
        .with_image_prior(Box::new(ConstantPrior { value: 2.0 }));

    let mut hook_terms = Vec::new();
    solver
        .run_observed(&y, |breakdown, _| hook_terms.push(breakdown.image_prior))
        .unwrap();
    for term in hook_terms {
        assert!((term - 0.5).abs() < 1e-12, "hook term = {term}");
    }
}

// ---------------------------------------------------------------------------
// Loss history
// ---------------------------------------------------------------------------

#[test]
fn loss_history_has_one_entry_per_iteration() {
    let y = as_image(checkerboard(16, 4));
    for iters in [1usize, 7, 20] {
        let mut solver = Solver::new(small_config(iters)).unwrap();
        let estimate = solver.run(&y).unwrap();
        assert_eq!(estimate.losses.len(), iters);
        assert!(estimate.losses.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn solver_keeps_kernel_near_impulse_for_sharp_measurement() {
    // A sharp measurement with the default tiny priors should stay near the
    // warm start: the kernel peak remains at the center.
    let y = as_image(checkerboard(24, 4));
    let mut solver = Solver::new(small_config(50)).unwrap();
    let estimate = solver.run(&y).unwrap();

    let kernel = deblur_core::tensor::plane(&estimate.kernel).to_owned();
    let (mut peak, mut peak_val) = ((0usize, 0usize), f32::MIN);
    for ((row, col), &v) in kernel.indexed_iter() {
        if v > peak_val {
            peak_val = v;
            peak = (row, col);
        }
    }
    assert_eq!(peak, (2, 2), "kernel peak wandered to {peak:?}");
}
