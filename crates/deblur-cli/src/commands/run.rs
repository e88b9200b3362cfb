use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deblur_core::io::{load_measurement, save_grayscale};
use deblur_core::solver::{Solver, SolverConfig};
use deblur_core::tensor::plane;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use super::simulate::save_kernel_scaled;

#[derive(Args)]
pub struct RunArgs {
    /// Blurred measurement image
    pub measurement: PathBuf,

    /// Solver configuration file (TOML); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Iteration count
    #[arg(long)]
    pub iters: Option<usize>,

    /// Image learning rate
    #[arg(long)]
    pub lr_x: Option<f32>,

    /// Kernel learning rate
    #[arg(long)]
    pub lr_k: Option<f32>,

    /// Kernel L2 prior weight
    #[arg(long)]
    pub lambda_k_l2: Option<f64>,

    /// Kernel center-of-mass prior weight
    #[arg(long)]
    pub lambda_k_center: Option<f64>,

    /// Kernel autocorrelation prior weight
    #[arg(long)]
    pub lambda_k_auto: Option<f64>,

    /// Pink-noise prior weight
    #[arg(long)]
    pub lambda_pink: Option<f64>,

    /// Kernel size in pixels (odd)
    #[arg(long)]
    pub kernel_size: Option<usize>,

    /// Diffusion prior weight (requires --score-model)
    #[cfg(feature = "diffusion")]
    #[arg(long)]
    pub lambda_diffusion: Option<f64>,

    /// Pretrained score model weights (safetensors)
    #[cfg(feature = "diffusion")]
    #[arg(long)]
    pub score_model: Option<PathBuf>,

    /// Output path for the estimated sharp image
    #[arg(short, long, default_value = "estimate.png")]
    pub output: PathBuf,

    /// Output path for the estimated kernel (peak-scaled for visibility)
    #[arg(long, default_value = "kernel.png")]
    pub kernel_output: PathBuf,
}

fn load_config(args: &RunArgs) -> Result<SolverConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => SolverConfig::default(),
    };

    if let Some(iters) = args.iters {
        config.num_iters = iters;
    }
    if let Some(lr) = args.lr_x {
        config.lr_x = lr;
    }
    if let Some(lr) = args.lr_k {
        config.lr_k = lr;
    }
    if let Some(weight) = args.lambda_k_l2 {
        config.lambda_k_l2 = weight;
    }
    if let Some(weight) = args.lambda_k_center {
        config.lambda_k_center = weight;
    }
    if let Some(weight) = args.lambda_k_auto {
        config.lambda_k_auto = weight;
    }
    if let Some(weight) = args.lambda_pink {
        config.lambda_pink = weight;
    }
    if let Some(size) = args.kernel_size {
        config.kernel_size = size;
    }
    #[cfg(feature = "diffusion")]
    if let Some(weight) = args.lambda_diffusion {
        config.lambda_diffusion = weight;
    }
    Ok(config)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let y_meas = load_measurement(&args.measurement)
        .with_context(|| format!("Failed to load {}", args.measurement.display()))?;
    debug!(shape = ?y_meas.shape(), "loaded measurement");
    let config = load_config(args)?;

    crate::summary::print_run_summary(&config, &args.measurement, &args.output);

    #[allow(unused_mut)]
    let mut solver = Solver::new(config.clone())?;

    #[cfg(feature = "diffusion")]
    if let Some(ref model_path) = args.score_model {
        use deblur_core::priors::diffusion::{load_score_model, score_device};
        let model = load_score_model(model_path, &score_device())
            .with_context(|| format!("Failed to load score model {}", model_path.display()))?;
        solver = solver.with_score_model(model);
    }

    let pb = ProgressBar::new(config.num_iters as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Estimating");

    let mut final_breakdown = None;
    let estimate = solver.run_observed(&y_meas, |breakdown, iter| {
        pb.set_position(iter as u64 + 1);
        pb.set_message(format!("loss {:.6}", breakdown.total));
        final_breakdown = Some(*breakdown);
    })?;
    pb.finish_with_message("done");

    save_grayscale(&plane(&estimate.image), &args.output)?;
    save_kernel_scaled(&plane(&estimate.kernel).to_owned(), &args.kernel_output)?;

    if let Some(breakdown) = final_breakdown {
        crate::summary::print_loss_breakdown(&breakdown);
    }
    println!("Saved estimate to {}", args.output.display());
    println!("Saved kernel to {}", args.kernel_output.display());
    Ok(())
}
