//! 2D FFT helpers shared by the spectral priors and the speckle PSF.
//!
//! Row/column passes over rustfft planners, computed in f64. The inverse
//! transforms carry the 1/(h*w) scale so that `ifft2d(fft2d(x)) == x`.

use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

pub fn fft2d(data: &Array2<f64>) -> Array2<Complex<f64>> {
    let complex = data.mapv(|v| Complex::new(v, 0.0));
    fft2d_complex(&complex)
}

pub fn fft2d_complex(data: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(w);
    let fft_col = planner.plan_fft_forward(h);

    let mut result = data.clone();

    // Row-wise FFT
    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| result[[row, c]]).collect();
        fft_row.process(&mut row_data);
        for col in 0..w {
            result[[row, col]] = row_data[col];
        }
    }

    // Column-wise FFT
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| result[[r, col]]).collect();
        fft_col.process(&mut col_data);
        for row in 0..h {
            result[[row, col]] = col_data[row];
        }
    }

    result
}

/// Inverse 2D FFT, returning the full complex result scaled by 1/(h*w).
pub fn ifft2d_complex(data: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();

    // Column-wise IFFT
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| work[[r, col]]).collect();
        ifft_col.process(&mut col_data);
        for row in 0..h {
            work[[row, col]] = col_data[row];
        }
    }

    // Row-wise IFFT
    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| work[[row, c]]).collect();
        ifft_row.process(&mut row_data);
        for col in 0..w {
            work[[row, col]] = row_data[col];
        }
    }

    let scale = 1.0 / (h * w) as f64;
    work.mapv_inplace(|v| v * scale);
    work
}

/// Inverse 2D FFT, keeping only the real part.
pub fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<f64> {
    ifft2d_complex(data).mapv(|v| v.re)
}

fn roll2(data: &Array2<f64>, dy: usize, dx: usize) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut out = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            out[[(row + dy) % h, (col + dx) % w]] = data[[row, col]];
        }
    }
    out
}

/// Move the zero-frequency (or zero-lag) sample to the array center.
pub fn fftshift(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    roll2(data, h / 2, w / 2)
}

/// Inverse of [`fftshift`]; moves the center sample back to [0,0].
pub fn ifftshift(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    roll2(data, h - h / 2, w - w / 2)
}

/// Unnormalized sample frequencies for an n-point DFT, in cycles per sample
/// (Nyquist at 0.5), laid out in the unshifted FFT order.
pub fn fft_freqs(n: usize) -> Vec<f64> {
    let mut freqs = vec![0.0; n];
    let half = n.div_ceil(2);
    for (i, f) in freqs.iter_mut().enumerate() {
        *f = if i < half {
            i as f64 / n as f64
        } else {
            (i as f64 - n as f64) / n as f64
        };
    }
    freqs
}
