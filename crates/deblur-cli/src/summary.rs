use std::collections::BTreeMap;
use std::path::Path;

use console::Style;
use deblur_core::objective::LossBreakdown;
use deblur_core::solver::SolverConfig;

use crate::commands::bench::BenchRow;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &SolverConfig, input: &Path, output: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Blind Deconvolution"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();
    println!(
        "  {:<16}{}",
        s.label.apply_to("Measurement"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<16}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!(
        "  {:<16}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.num_iters)
    );
    println!(
        "  {:<16}{}",
        s.label.apply_to("Kernel size"),
        s.value.apply_to(config.kernel_size)
    );
    println!(
        "  {:<16}lr_x {} / lr_k {}",
        s.label.apply_to("Learning rates"),
        s.value.apply_to(config.lr_x),
        s.value.apply_to(config.lr_k)
    );
    println!(
        "  {:<16}l2 {} / center {} / auto {} / pink {} / diffusion {}",
        s.label.apply_to("Prior weights"),
        s.value.apply_to(config.lambda_k_l2),
        s.value.apply_to(config.lambda_k_center),
        s.value.apply_to(config.lambda_k_auto),
        s.value.apply_to(config.lambda_pink),
        s.value.apply_to(config.lambda_diffusion)
    );
    println!();
}

pub fn print_loss_breakdown(breakdown: &LossBreakdown) {
    let s = Styles::new();
    println!();
    println!("  {}", s.title.apply_to("Final loss"));
    for (name, value) in breakdown.metrics() {
        println!("  {:<16}{:.6e}", s.label.apply_to(name), value);
    }
    println!();
}

pub fn print_bench_rows(rows: &[BenchRow]) {
    let s = Styles::new();
    println!();
    println!(
        "  {:<20}{:<12}{:>10}{:>10}{:>12}{:>14}",
        s.label.apply_to("image"),
        s.label.apply_to("psf"),
        s.label.apply_to("psnr"),
        s.label.apply_to("ssim"),
        s.label.apply_to("k-error"),
        s.label.apply_to("final loss"),
    );
    for row in rows {
        println!(
            "  {:<20}{:<12}{:>10.2}{:>10.4}{:>12.4}{:>14.6e}",
            row.image, row.psf, row.psnr, row.ssim, row.kernel_error, row.final_loss
        );
    }
}

pub fn print_bench_means(by_psf: &BTreeMap<String, Vec<&BenchRow>>) {
    let s = Styles::new();
    println!();
    println!("  {}", s.title.apply_to("Mean by PSF"));
    for (psf, rows) in by_psf {
        let n = rows.len() as f64;
        let mean_psnr: f64 = rows.iter().map(|r| r.psnr).sum::<f64>() / n;
        let mean_ssim: f64 = rows.iter().map(|r| r.ssim).sum::<f64>() / n;
        let mean_kerr: f64 = rows.iter().map(|r| r.kernel_error).sum::<f64>() / n;
        println!(
            "  {:<12}psnr {:>7.2}  ssim {:>7.4}  k-error {:>8.4}",
            s.value.apply_to(psf),
            mean_psnr,
            mean_ssim,
            mean_kerr
        );
    }
    println!();
}
