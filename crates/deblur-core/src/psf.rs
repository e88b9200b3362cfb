//! PSF (point-spread function) generation.
//!
//! Produces the normalized, non-negative, odd-sized kernels the solver and
//! the forward model consume: ground-truth blurs for experiments and the
//! near-impulse motion kernel used as the solver's warm start.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{DeblurError, Result};
use crate::fft;

/// PSF family, with per-family parameters. `None` parameters fall back to
/// size-derived defaults at generation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PsfKind {
    Delta,
    Gaussian {
        sigma: f32,
    },
    Motion {
        length: Option<usize>,
        angle: f32,
    },
    Disk {
        radius: Option<f32>,
    },
    Turbulence {
        fried_parameter: Option<f32>,
        distortion_strength: f32,
        seed: Option<u64>,
    },
    Speckle {
        bandwidth: f32,
        seed: Option<u64>,
    },
}

impl fmt::Display for PsfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delta => write!(f, "delta"),
            Self::Gaussian { .. } => write!(f, "gaussian"),
            Self::Motion { .. } => write!(f, "motion"),
            Self::Disk { .. } => write!(f, "disk"),
            Self::Turbulence { .. } => write!(f, "turbulence"),
            Self::Speckle { .. } => write!(f, "speckle"),
        }
    }
}

impl FromStr for PsfKind {
    type Err = DeblurError;

    /// Parse a PSF kind by name with its default parameters.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "delta" => Ok(Self::Delta),
            "gaussian" => Ok(Self::Gaussian { sigma: 2.0 }),
            "motion" => Ok(Self::Motion {
                length: None,
                angle: 0.0,
            }),
            "disk" => Ok(Self::Disk { radius: None }),
            "turbulence" => Ok(Self::Turbulence {
                fried_parameter: None,
                distortion_strength: 0.6,
                seed: None,
            }),
            "speckle" => Ok(Self::Speckle {
                bandwidth: 0.35,
                seed: None,
            }),
            other => Err(DeblurError::UnknownPsfKind(other.to_string())),
        }
    }
}

/// Generate a size x size PSF of the given kind.
pub fn generate(kind: &PsfKind, size: usize) -> Result<Array2<f32>> {
    match kind {
        PsfKind::Delta => delta(size),
        PsfKind::Gaussian { sigma } => gaussian(size, *sigma),
        PsfKind::Motion { length, angle } => motion(size, *length, *angle),
        PsfKind::Disk { radius } => disk(size, radius.unwrap_or(size as f32 / 4.0)),
        PsfKind::Turbulence {
            fried_parameter,
            distortion_strength,
            seed,
        } => turbulence(size, *fried_parameter, *distortion_strength, *seed),
        PsfKind::Speckle { bandwidth, seed } => speckle(size, *bandwidth, *seed),
    }
}

/// Pure center impulse (identity blur).
pub fn delta(size: usize) -> Result<Array2<f32>> {
    check_size(size)?;
    let mut psf = Array2::<f64>::zeros((size, size));
    psf[[size / 2, size / 2]] = 1.0;
    normalize(psf)
}

/// Isotropic Gaussian blur.
pub fn gaussian(size: usize, sigma: f32) -> Result<Array2<f32>> {
    check_size(size)?;
    if sigma <= 0.0 {
        return Err(DeblurError::InvalidPsfParameter {
            name: "sigma",
            value: sigma as f64,
            requirement: "positive",
        });
    }

    let ax = centered_axis(size);
    let s2 = 2.0 * sigma as f64 * sigma as f64;
    let mut psf = Array2::<f64>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            psf[[row, col]] = (-(ax[col] * ax[col] + ax[row] * ax[row]) / s2).exp();
        }
    }
    normalize(psf)
}

/// Linear motion blur: a centered line segment rotated by `angle_deg`.
///
/// `length` defaults to size/2; a length of 1 degenerates to an impulse,
/// which is what the solver uses as its warm-start kernel.
pub fn motion(size: usize, length: Option<usize>, angle_deg: f32) -> Result<Array2<f32>> {
    check_size(size)?;
    let length = length.unwrap_or_else(|| (size / 2).max(1));

    let mut psf = Array2::<f64>::zeros((size, size));
    let center = size / 2;
    let half = length / 2;
    let start = center.saturating_sub(half);
    let end = (center + half + 1).min(size);
    for col in start..end {
        psf[[center, col]] = 1.0;
    }

    if angle_deg.rem_euclid(360.0) != 0.0 {
        psf = rotate_bilinear(&psf, angle_deg as f64);
    }
    normalize(psf)
}

/// Uniform disk (defocus-style blur).
pub fn disk(size: usize, radius: f32) -> Result<Array2<f32>> {
    check_size(size)?;
    if radius <= 0.0 {
        return Err(DeblurError::InvalidPsfParameter {
            name: "radius",
            value: radius as f64,
            requirement: "positive",
        });
    }

    let ax = centered_axis(size);
    let r2 = radius as f64 * radius as f64;
    let mut psf = Array2::<f64>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            if ax[col] * ax[col] + ax[row] * ax[row] <= r2 {
                psf[[row, col]] = 1.0;
            }
        }
    }
    normalize(psf)
}

/// Atmospheric-turbulence-inspired PSF: a heavy-tailed Kolmogorov-like
/// radial envelope with sheared anisotropy and smoothed low-frequency
/// distortions. Generally harder to invert than a straight-line motion blur.
pub fn turbulence(
    size: usize,
    fried_parameter: Option<f32>,
    distortion_strength: f32,
    seed: Option<u64>,
) -> Result<Array2<f32>> {
    check_size(size)?;
    if distortion_strength < 0.0 {
        return Err(DeblurError::InvalidPsfParameter {
            name: "distortion_strength",
            value: distortion_strength as f64,
            requirement: "non-negative",
        });
    }
    let fried = fried_parameter.unwrap_or_else(|| (size as f32 / 8.0).max(1.0));
    if fried <= 0.0 {
        return Err(DeblurError::InvalidPsfParameter {
            name: "fried_parameter",
            value: fried as f64,
            requirement: "positive",
        });
    }

    let mut rng = rng_from_seed(seed);
    let ax = centered_axis(size);

    // Small random anisotropy emulating wind-driven shear.
    let shear_x = 1.0 + 0.3 * rng.sample::<f64, _>(StandardNormal);
    let shear_y = 1.0 + 0.3 * rng.sample::<f64, _>(StandardNormal);

    let fried = fried as f64;
    let mut base = Array2::<f64>::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            let x = ax[col] / shear_x;
            let y = ax[row] / shear_y;
            let rho = (x * x + y * y).sqrt() + 1e-8;
            base[[row, col]] = (-0.5 * (rho / fried).powf(5.0 / 3.0)).exp();
        }
    }

    // Low-frequency distortion field: smoothed, standardized white noise.
    let mut noise = Array2::<f64>::zeros((size, size));
    for v in noise.iter_mut() {
        *v = rng.sample(StandardNormal);
    }
    let mut distortion = gaussian_filter_reflect(&noise, (size as f64 / 10.0).max(1.0));
    let mean = distortion.sum() / (size * size) as f64;
    distortion.mapv_inplace(|v| v - mean);
    let std = (distortion.iter().map(|v| v * v).sum::<f64>() / (size * size) as f64).sqrt();
    distortion.mapv_inplace(|v| v / (std + 1e-8));

    let psf = &base * &distortion.mapv(|v| (distortion_strength as f64 * v).exp());
    normalize(psf)
}

/// Randomized-optics speckle PSF from band-limited random Fourier phases.
///
/// `bandwidth` is the kept fraction of the Nyquist radius and controls the
/// speckle granularity; it must lie in (0, 1].
pub fn speckle(size: usize, bandwidth: f32, seed: Option<u64>) -> Result<Array2<f32>> {
    check_size(size)?;
    if bandwidth <= 0.0 || bandwidth > 1.0 {
        return Err(DeblurError::InvalidPsfParameter {
            name: "bandwidth",
            value: bandwidth as f64,
            requirement: "in (0, 1]",
        });
    }

    let mut rng = rng_from_seed(seed);
    let freqs = fft::fft_freqs(size);
    let cutoff = 0.5 * bandwidth as f64;

    let mut mask = Array2::<f64>::zeros((size, size));
    let mut any = false;
    for row in 0..size {
        for col in 0..size {
            let radius = (freqs[col] * freqs[col] + freqs[row] * freqs[row]).sqrt();
            if radius <= cutoff {
                mask[[row, col]] = 1.0;
                any = true;
            }
        }
    }
    if !any {
        return Err(DeblurError::DegeneratePsf(
            "bandwidth is too small; band-limit mask is empty".into(),
        ));
    }

    // White noise with randomized Fourier phases, band-limited in frequency.
    let mut noise = Array2::<f64>::zeros((size, size));
    for v in noise.iter_mut() {
        *v = rng.sample(StandardNormal);
    }
    let mut spectrum = fft::fft2d(&noise);
    for row in 0..size {
        for col in 0..size {
            spectrum[[row, col]] *= Complex::new(mask[[row, col]], 0.0);
        }
    }
    let field = fft::ifft2d_complex(&spectrum);

    // Intensity of the complex field yields a nonnegative speckle PSF.
    let psf = field.mapv(|v| v.norm_sqr());
    normalize(psf)
}

/// Clamp negatives and rescale so the PSF sums to 1.
pub fn normalize(psf: Array2<f64>) -> Result<Array2<f32>> {
    let clamped = psf.mapv(|v| v.max(0.0));
    let sum = clamped.sum();
    if sum <= 0.0 {
        return Err(DeblurError::DegeneratePsf(
            "sum is non-positive; cannot normalize".into(),
        ));
    }
    Ok(clamped.mapv(|v| (v / sum) as f32))
}

fn check_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(DeblurError::InvalidPsfParameter {
            name: "size",
            value: 0.0,
            requirement: "positive",
        });
    }
    Ok(())
}

/// Integer-spaced axis centered on zero: -(size/2) ..= size/2 for odd sizes.
fn centered_axis(size: usize) -> Vec<f64> {
    let half = (size / 2) as f64;
    if size == 1 {
        return vec![0.0];
    }
    let step = 2.0 * half / (size - 1) as f64;
    (0..size).map(|i| -half + i as f64 * step).collect()
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// Rotate a plane counterclockwise by `angle_deg` about its center using
/// bilinear interpolation; samples outside the source are zero.
fn rotate_bilinear(img: &Array2<f64>, angle_deg: f64) -> Array2<f64> {
    let (h, w) = img.dim();
    let cy = (h as f64 - 1.0) / 2.0;
    let cx = (w as f64 - 1.0) / 2.0;
    let theta = angle_deg.to_radians();
    let (sin_t, cos_t) = theta.sin_cos();

    let mut out = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let dy = row as f64 - cy;
            let dx = col as f64 - cx;
            // Inverse map: rotate the output coordinate back into the source.
            let sx = cos_t * dx + sin_t * dy + cx;
            let sy = -sin_t * dx + cos_t * dy + cy;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;

            let mut acc = 0.0;
            for (oy, wy) in [(0.0, 1.0 - fy), (1.0, fy)] {
                for (ox, wx) in [(0.0, 1.0 - fx), (1.0, fx)] {
                    let yi = y0 + oy;
                    let xi = x0 + ox;
                    if yi >= 0.0 && yi < h as f64 && xi >= 0.0 && xi < w as f64 {
                        acc += wy * wx * img[[yi as usize, xi as usize]];
                    }
                }
            }
            out[[row, col]] = acc;
        }
    }
    out
}

/// Separable Gaussian smoothing with reflect (symmetric) boundary handling.
fn gaussian_filter_reflect(data: &Array2<f64>, sigma: f64) -> Array2<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    let mut kernel = vec![0.0f64; 2 * radius + 1];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - radius as f64;
        *k = (-x * x / s2).exp();
        sum += *k;
    }
    for v in &mut kernel {
        *v /= sum;
    }

    let (h, w) = data.dim();
    let reflect = |i: isize, n: usize| -> usize {
        let n = n as isize;
        let mut i = i;
        loop {
            if i < 0 {
                i = -i - 1;
            } else if i >= n {
                i = 2 * n - i - 1;
            } else {
                return i as usize;
            }
        }
    };

    let mut row_pass = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mut acc = 0.0;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src = reflect(col as isize + ki as isize - radius as isize, w);
                acc += data[[row, src]] * kv;
            }
            row_pass[[row, col]] = acc;
        }
    }

    let mut out = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mut acc = 0.0;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src = reflect(row as isize + ki as isize - radius as isize, h);
                acc += row_pass[[src, col]] * kv;
            }
            out[[row, col]] = acc;
        }
    }
    out
}
