use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deblur_core::forward::simulate_with;
use deblur_core::io::load_grayscale;
use deblur_core::metrics::{kernel_error, psnr, ssim};
use deblur_core::psf::{self, PsfKind};
use deblur_core::solver::{Solver, SolverConfig};
use deblur_core::tensor::{image_to_tensor, kernel_to_tensor};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Args)]
pub struct BenchArgs {
    /// Sharp ground-truth images to sweep
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Iteration count per run
    #[arg(long, default_value = "200")]
    pub iters: usize,

    /// Kernel size in pixels (odd)
    #[arg(long, default_value = "15")]
    pub kernel_size: usize,

    /// Sigma for the Gaussian PSF
    #[arg(long, default_value = "2.0")]
    pub sigma_gaussian: f32,

    /// Angle in degrees for the motion PSF
    #[arg(long, default_value = "0.0")]
    pub angle_motion: f32,

    /// Measurement noise standard deviation
    #[arg(long, default_value = "0.01")]
    pub noise_sigma: f32,

    /// RNG seed for reproducible measurements
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

pub struct BenchRow {
    pub image: String,
    pub psf: String,
    pub psnr: f64,
    pub ssim: f64,
    pub kernel_error: f64,
    pub final_loss: f64,
}

pub fn run(args: &BenchArgs) -> Result<()> {
    let psf_specs: Vec<PsfKind> = vec![
        PsfKind::Delta,
        PsfKind::Gaussian {
            sigma: args.sigma_gaussian,
        },
        PsfKind::Motion {
            length: Some(args.kernel_size / 2),
            angle: args.angle_motion,
        },
        PsfKind::Disk { radius: None },
    ];

    let config = SolverConfig {
        num_iters: args.iters,
        kernel_size: args.kernel_size,
        ..SolverConfig::default()
    };

    let total_runs = args.images.len() * psf_specs.len();
    let pb = ProgressBar::new(total_runs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let mut rows = Vec::with_capacity(total_runs);
    for image_path in &args.images {
        let sharp = load_grayscale(image_path)
            .with_context(|| format!("Failed to load {}", image_path.display()))?;
        let x_true = image_to_tensor(sharp);
        let image_label = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());

        for kind in &psf_specs {
            pb.set_message(format!("{image_label}/{kind}"));

            let k_true = kernel_to_tensor(psf::generate(kind, args.kernel_size)?);
            let mut rng = StdRng::seed_from_u64(args.seed);
            let y_meas = simulate_with(&x_true, &k_true, args.noise_sigma, &mut rng)?;

            let mut solver = Solver::new(config.clone())?;
            let estimate = solver.run(&y_meas)?;

            rows.push(BenchRow {
                image: image_label.clone(),
                psf: kind.to_string(),
                psnr: psnr(&estimate.image, &x_true, 1.0)?,
                ssim: ssim(&estimate.image, &x_true, 1.0)?,
                kernel_error: kernel_error(&estimate.kernel, &k_true)?,
                final_loss: estimate.losses.last().copied().unwrap_or(f64::NAN),
            });
            pb.inc(1);
        }
    }
    pb.finish_and_clear();

    crate::summary::print_bench_rows(&rows);

    // Per-PSF means across all images.
    let mut by_psf: BTreeMap<String, Vec<&BenchRow>> = BTreeMap::new();
    for row in &rows {
        by_psf.entry(row.psf.clone()).or_default().push(row);
    }
    crate::summary::print_bench_means(&by_psf);
    Ok(())
}
