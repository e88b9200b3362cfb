use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deblur_core::forward::{simulate, simulate_with};
use deblur_core::io::{load_grayscale, save_grayscale};
use deblur_core::psf;
use deblur_core::tensor::{image_to_tensor, kernel_to_tensor, plane};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Args)]
pub struct SimulateArgs {
    /// Sharp input image (PNG or TIFF, treated as grayscale)
    pub image: PathBuf,

    /// PSF kind (delta, gaussian, motion, disk, turbulence, speckle)
    #[arg(long, default_value = "gaussian")]
    pub psf: String,

    /// Kernel size in pixels (odd)
    #[arg(long, default_value = "15")]
    pub kernel_size: usize,

    /// Gaussian PSF sigma in pixels
    #[arg(long, default_value = "2.0")]
    pub sigma: f32,

    /// Motion blur length in pixels (defaults to kernel_size / 2)
    #[arg(long)]
    pub length: Option<usize>,

    /// Motion blur angle in degrees
    #[arg(long, default_value = "0.0")]
    pub angle: f32,

    /// Disk PSF radius in pixels (defaults to kernel_size / 4)
    #[arg(long)]
    pub radius: Option<f32>,

    /// Speckle band-limit as a fraction of Nyquist, in (0, 1]
    #[arg(long, default_value = "0.35")]
    pub bandwidth: f32,

    /// RNG seed for stochastic PSFs and the measurement noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Additive Gaussian noise standard deviation
    #[arg(long, default_value = "0.01")]
    pub noise_sigma: f32,

    /// Output measurement path
    #[arg(short, long, default_value = "measurement.png")]
    pub output: PathBuf,

    /// Also save the ground-truth kernel (peak-scaled for visibility)
    #[arg(long)]
    pub kernel_output: Option<PathBuf>,
}

pub fn run(args: &SimulateArgs) -> Result<()> {
    let sharp = load_grayscale(&args.image)
        .with_context(|| format!("Failed to load {}", args.image.display()))?;
    println!("Loaded {}x{} image", sharp.ncols(), sharp.nrows());

    let kind = super::build_psf_kind(
        &args.psf,
        args.sigma,
        args.length,
        args.angle,
        args.radius,
        args.bandwidth,
        args.seed,
    )?;
    let kernel = psf::generate(&kind, args.kernel_size)?;

    let x = image_to_tensor(sharp);
    let k = kernel_to_tensor(kernel);
    let y = match args.seed {
        Some(seed) => simulate_with(&x, &k, args.noise_sigma, &mut StdRng::seed_from_u64(seed))?,
        None => simulate(&x, &k, args.noise_sigma)?,
    };

    save_grayscale(&plane(&y), &args.output)?;
    println!(
        "Saved {} measurement to {}",
        kind,
        args.output.display()
    );

    if let Some(ref kernel_path) = args.kernel_output {
        save_kernel_scaled(&plane(&k).to_owned(), kernel_path)?;
        println!("Saved ground-truth kernel to {}", kernel_path.display());
    }
    Ok(())
}

/// Kernels sum to 1, so raw values are nearly black; rescale to peak 1
/// before writing.
pub fn save_kernel_scaled(kernel: &ndarray::Array2<f32>, path: &std::path::Path) -> Result<()> {
    let peak = kernel.iter().cloned().fold(0.0f32, f32::max);
    let scaled = if peak > 0.0 {
        kernel.mapv(|v| v / peak)
    } else {
        kernel.clone()
    };
    save_grayscale(&scaled.view(), path)?;
    Ok(())
}
