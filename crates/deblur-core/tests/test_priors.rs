mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{assert_grad_close, finite_diff, impulse, uniform_box};
use deblur_core::error::Result;
use deblur_core::priors::diffusion::{
    diffusion_prior, diffusion_score, ScoreModel, ScoreModelCell,
};
use deblur_core::priors::kernel::{
    autocorrelation, autocorrelation_value, center_of_mass, center_of_mass_value, l2, l2_value,
};
use deblur_core::priors::pink_noise::{pink_noise, pink_noise_value};
use deblur_core::psf;
use deblur_core::synthetic::{checkerboard, gradient, GradientDirection};
use ndarray::{Array2, Array3};

// ---------------------------------------------------------------------------
// Kernel L2
// ---------------------------------------------------------------------------

#[test]
fn l2_of_impulse_is_one_over_n() {
    let k = impulse(5);
    let value = l2_value(&k.view());
    assert!((value - 1.0 / 25.0).abs() < 1e-12, "value = {value}");
}

#[test]
fn l2_prefers_spread_kernels() {
    // With total mass fixed at 1, the uniform kernel minimizes mean(k^2).
    assert!(l2_value(&uniform_box(5).view()) < l2_value(&impulse(5).view()));
}

#[test]
fn l2_gradient_matches_finite_difference() {
    let k = psf::gaussian(5, 1.2).unwrap();
    let eval = l2(&k.view());
    let numeric = finite_diff(|p| l2_value(&p.view()), &k, 1e-3);
    assert_grad_close(&eval.grad, &numeric, 1e-4, 1e-2);
}

// ---------------------------------------------------------------------------
// Kernel center of mass
// ---------------------------------------------------------------------------

#[test]
fn center_of_mass_is_zero_for_centered_impulse() {
    let value = center_of_mass_value(&impulse(15).view());
    assert!(value.abs() < 1e-9, "value = {value}");
}

#[test]
fn center_of_mass_penalizes_corner_mass() {
    let mut k = Array2::<f32>::zeros((15, 15));
    k[[0, 0]] = 1.0;
    // Corner of the [-1,1]^2 grid has squared radius 2.
    let value = center_of_mass_value(&k.view());
    assert!((value - 2.0).abs() < 1e-6, "value = {value}");
}

#[test]
fn center_of_mass_handles_all_zero_kernel() {
    let k = Array2::<f32>::zeros((7, 7));
    let value = center_of_mass_value(&k.view());
    assert_eq!(value, 0.0);
}

#[test]
fn center_of_mass_gradient_matches_finite_difference() {
    // Strictly positive kernel keeps the |k| subgradient away from its kink.
    let k = psf::gaussian(5, 1.5).unwrap();
    let eval = center_of_mass(&k.view());
    let numeric = finite_diff(|p| center_of_mass_value(&p.view()), &k, 1e-4);
    assert_grad_close(&eval.grad, &numeric, 1e-3, 2e-2);
}

// ---------------------------------------------------------------------------
// Kernel autocorrelation
// ---------------------------------------------------------------------------

#[test]
fn autocorrelation_is_zero_for_impulse() {
    let value = autocorrelation_value(&impulse(15).view());
    assert!(value.abs() < 1e-12, "value = {value}");
}

#[test]
fn autocorrelation_is_positive_for_uniform_box() {
    let value = autocorrelation_value(&uniform_box(15).view());
    assert!(value > 1e-8, "value = {value}");
}

#[test]
fn autocorrelation_gradient_matches_finite_difference() {
    let k = psf::gaussian(5, 1.2).unwrap();
    let eval = autocorrelation(&k.view());
    let numeric = finite_diff(|p| autocorrelation_value(&p.view()), &k, 1e-3);
    assert_grad_close(&eval.grad, &numeric, 1e-4, 2e-2);
}

// ---------------------------------------------------------------------------
// Pink-noise spectral prior
// ---------------------------------------------------------------------------

#[test]
fn pink_noise_penalizes_high_frequency_content() {
    // A one-cell checkerboard is all Nyquist energy; a smooth ramp is not.
    let noisy = checkerboard(16, 16);
    let smooth = gradient(16, GradientDirection::Horizontal);
    let noisy_value = pink_noise_value(&noisy.view(), 1.0);
    let smooth_value = pink_noise_value(&smooth.view(), 1.0);
    assert!(
        noisy_value > smooth_value,
        "checkerboard {noisy_value} should exceed ramp {smooth_value}"
    );
}

#[test]
fn pink_noise_value_is_nonnegative() {
    let value = pink_noise_value(&checkerboard(8, 2).view(), 1.0);
    assert!(value >= 0.0);
}

#[test]
fn pink_noise_gradient_matches_finite_difference() {
    let x = gradient(8, GradientDirection::Horizontal);
    let eval = pink_noise(&x.view(), 1.0);
    let numeric = finite_diff(|p| pink_noise_value(&p.view(), 1.0), &x, 1e-3);
    assert_grad_close(&eval.grad, &numeric, 1e-4, 2e-2);
}

// ---------------------------------------------------------------------------
// Diffusion score prior (stubbed model)
// ---------------------------------------------------------------------------

/// Stub denoiser predicting its own input as the noise; counts calls.
struct EchoModel {
    calls: AtomicUsize,
}

impl EchoModel {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScoreModel for EchoModel {
    fn num_timesteps(&self) -> usize {
        1000
    }

    fn predict_noise(&self, rgb: &Array3<f32>, _t_index: usize) -> Result<Array3<f32>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(rgb.clone())
    }
}

#[test]
fn diffusion_score_negates_channel_mean() {
    // With the echo stub, predicted noise equals the [-1,1]-scaled input on
    // every channel, so the score is -(2x - 1).
    let x = gradient(8, GradientDirection::Vertical);
    let model = EchoModel::new();
    let score = diffusion_score(&x.view(), &model, 200).unwrap();
    for ((row, col), &s) in score.indexed_iter() {
        let expected = -(x[[row, col]] * 2.0 - 1.0);
        assert!(
            (s - expected).abs() < 1e-6,
            "score at [{row},{col}] = {s}, expected {expected}"
        );
    }
}

#[test]
fn diffusion_prior_value_and_surrogate_gradient() {
    let x = gradient(8, GradientDirection::Horizontal);
    let model = EchoModel::new();
    let eval = diffusion_prior(&x.view(), &model, 200).unwrap();

    let n = 64.0f64;
    let expected: f64 = x
        .iter()
        .map(|&v| {
            let s = (v * 2.0 - 1.0) as f64;
            s * s
        })
        .sum::<f64>()
        * 0.5
        / n;
    assert!(
        (eval.value - expected).abs() < 1e-9,
        "value {} vs {expected}",
        eval.value
    );

    // Surrogate gradient is -score/n.
    for ((row, col), &g) in eval.grad.indexed_iter() {
        let score = -(x[[row, col]] * 2.0 - 1.0);
        let expected = -(score as f64) / n;
        assert!(
            (g as f64 - expected).abs() < 1e-9,
            "grad at [{row},{col}] = {g}, expected {expected}"
        );
    }
}

#[test]
fn diffusion_timestep_is_clamped_into_model_range() {
    struct TinyModel;
    impl ScoreModel for TinyModel {
        fn num_timesteps(&self) -> usize {
            10
        }
        fn predict_noise(&self, rgb: &Array3<f32>, t_index: usize) -> Result<Array3<f32>> {
            assert!(t_index < 10, "timestep {t_index} escaped the valid range");
            Ok(rgb.clone())
        }
    }
    let x = gradient(4, GradientDirection::Horizontal);
    diffusion_score(&x.view(), &TinyModel, 200).unwrap();
}

#[test]
fn score_model_cell_loads_once() {
    let cell = ScoreModelCell::new();
    let constructions = AtomicUsize::new(0);

    for _ in 0..3 {
        cell.get_or_try_init(|| {
            constructions.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(EchoModel::new()) as Arc<dyn ScoreModel>)
        })
        .unwrap();
    }
    assert_eq!(constructions.load(Ordering::Relaxed), 1);
    assert!(cell.get().is_some());
}
