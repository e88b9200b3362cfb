pub mod bench;
pub mod config;
pub mod run;
pub mod simulate;

use anyhow::{bail, Result};
use deblur_core::psf::PsfKind;

/// Build a PSF kind from a CLI name plus the per-family flags.
pub fn build_psf_kind(
    name: &str,
    sigma: f32,
    length: Option<usize>,
    angle: f32,
    radius: Option<f32>,
    bandwidth: f32,
    seed: Option<u64>,
) -> Result<PsfKind> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "delta" => PsfKind::Delta,
        "gaussian" => PsfKind::Gaussian { sigma },
        "motion" => PsfKind::Motion { length, angle },
        "disk" => PsfKind::Disk { radius },
        "turbulence" => PsfKind::Turbulence {
            fried_parameter: None,
            distortion_strength: 0.6,
            seed,
        },
        "speckle" => PsfKind::Speckle { bandwidth, seed },
        other => bail!("Unknown PSF kind '{other}' (expected delta, gaussian, motion, disk, turbulence or speckle)"),
    };
    Ok(kind)
}
