//! Synthetic test images with known structure, used as ground truths for
//! simulation experiments and tests. All values lie in [0, 1].

use ndarray::Array2;
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fft;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradientDirection {
    Horizontal,
    Vertical,
}

/// Alternating checkerboard with `num_checks` cells per axis.
pub fn checkerboard(size: usize, num_checks: usize) -> Array2<f32> {
    let cell = (size / num_checks.max(1)).max(1);
    let mut img = Array2::<f32>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            img[[row, col]] = ((row / cell + col / cell) % 2) as f32;
        }
    }
    img
}

/// Linear ramp from 0 to 1.
pub fn gradient(size: usize, direction: GradientDirection) -> Array2<f32> {
    let mut img = Array2::<f32>::zeros((size, size));
    let denom = (size.max(2) - 1) as f32;
    for row in 0..size {
        for col in 0..size {
            let t = match direction {
                GradientDirection::Horizontal => col as f32 / denom,
                GradientDirection::Vertical => row as f32 / denom,
            };
            img[[row, col]] = t;
        }
    }
    img
}

/// Centered filled circle; `radius_ratio` is relative to the image size.
pub fn circle(size: usize, radius_ratio: f32) -> Array2<f32> {
    let radius = size as f32 * radius_ratio;
    let r2 = radius * radius;
    let center = (size as f32 - 1.0) / 2.0;
    let mut img = Array2::<f32>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            let dy = row as f32 - center;
            let dx = col as f32 - center;
            if dx * dx + dy * dy <= r2 {
                img[[row, col]] = 1.0;
            }
        }
    }
    img
}

/// Vertical bars of the given width.
pub fn bars(size: usize, bar_width: usize) -> Array2<f32> {
    let bar_width = bar_width.max(1);
    let mut img = Array2::<f32>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            if (col / bar_width) % 2 == 0 {
                img[[row, col]] = 1.0;
            }
        }
    }
    img
}

/// 1/f^beta noise field built in the Fourier domain from random phases,
/// min-max normalized into [0, 1].
pub fn pink_field(size: usize, beta: f64, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let freqs = fft::fft_freqs(size);

    let mut spectrum = Array2::<Complex<f64>>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            let f = (freqs[col] * freqs[col] + freqs[row] * freqs[row]).sqrt();
            let amplitude = if row == 0 && col == 0 {
                1.0
            } else {
                1.0 / f.powf(beta)
            };
            let phase = rng.random::<f64>() * std::f64::consts::TAU;
            spectrum[[row, col]] = Complex::from_polar(amplitude, phase);
        }
    }

    let mut field = fft::ifft2d(&spectrum);
    let min = field.iter().cloned().fold(f64::INFINITY, f64::min);
    field.mapv_inplace(|v| v - min);
    let max = field.iter().cloned().fold(0.0f64, f64::max);
    if max > 0.0 {
        field.mapv_inplace(|v| v / max);
    }
    field.mapv(|v| v as f32)
}
