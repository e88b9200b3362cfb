//! Score-based image prior backed by a pretrained denoising model.
//!
//! The model is an explicit resource handle: callers construct it once
//! (directly or through [`ScoreModelCell`]) and pass it in. Weights are
//! read-only after construction and shared for the process lifetime; the
//! network itself is never differentiated through.

use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2};
use once_cell::sync::OnceCell;

use super::TermEval;
use crate::error::Result;

/// Mid-range noise timestep; encourages natural-image statistics without
/// pulling the estimate toward pure noise.
pub const DEFAULT_TIMESTEP: usize = 200;

/// A pretrained denoiser usable as an approximate score function.
///
/// Implementations must be cheap to share (`Send + Sync`) and immutable
/// after construction.
pub trait ScoreModel: Send + Sync {
    /// Number of noise timesteps the denoiser was trained on; timestep
    /// indices are clamped into [0, num_timesteps).
    fn num_timesteps(&self) -> usize;

    /// Predicted noise for a (3, H, W) input scaled to [-1, 1].
    fn predict_noise(&self, rgb: &Array3<f32>, t_index: usize) -> Result<Array3<f32>>;
}

/// Approximate score (gradient of log-density) of the natural-image
/// distribution at `x`.
///
/// The single-channel estimate is replicated to three channels, rescaled
/// from [0,1] to [-1,1], passed through the denoiser at the clamped
/// timestep, averaged back to one channel, and negated. The score's scale
/// (the missing 1/sigma_t) is deliberately absorbed by the diffusion weight.
pub fn diffusion_score(
    x: &ArrayView2<f32>,
    model: &dyn ScoreModel,
    t_index: usize,
) -> Result<Array2<f32>> {
    let (h, w) = x.dim();
    let t = t_index.min(model.num_timesteps().saturating_sub(1));

    let mut rgb = Array3::<f32>::zeros((3, h, w));
    for ch in 0..3 {
        for row in 0..h {
            for col in 0..w {
                rgb[[ch, row, col]] = x[[row, col]] * 2.0 - 1.0;
            }
        }
    }

    let noise = model.predict_noise(&rgb, t)?;

    let mut score = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mean = (noise[[0, row, col]] + noise[[1, row, col]] + noise[[2, row, col]]) / 3.0;
            score[[row, col]] = -mean;
        }
    }
    Ok(score)
}

pub fn diffusion_prior_value(
    x: &ArrayView2<f32>,
    model: &dyn ScoreModel,
    t_index: usize,
) -> Result<f64> {
    let score = diffusion_score(x, model, t_index)?;
    let n = score.len() as f64;
    Ok(0.5 * score.iter().map(|&v| v as f64 * v as f64).sum::<f64>() / n)
}

/// Half mean squared score, with the frozen-score surrogate gradient -s/n:
/// gradient descent moves the estimate along the score, toward higher
/// model density. The denoiser's parameters receive no gradient.
pub fn diffusion_prior(
    x: &ArrayView2<f32>,
    model: &dyn ScoreModel,
    t_index: usize,
) -> Result<TermEval> {
    let score = diffusion_score(x, model, t_index)?;
    let n = score.len() as f64;
    let value = 0.5 * score.iter().map(|&v| v as f64 * v as f64).sum::<f64>() / n;
    let grad = score.mapv(|v| (-(v as f64) / n) as f32);
    Ok(TermEval { value, grad })
}

/// Thread-safe memoized accessor for a shared score model.
///
/// Loads at most once per cell; later calls return the cached handle. The
/// stored model is read-only, so no further synchronization is needed.
#[derive(Default)]
pub struct ScoreModelCell {
    cell: OnceCell<Arc<dyn ScoreModel>>,
}

impl ScoreModelCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Get the cached model, constructing it with `init` on first access.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<&Arc<dyn ScoreModel>>
    where
        F: FnOnce() -> Result<Arc<dyn ScoreModel>>,
    {
        self.cell.get_or_try_init(init)
    }

    pub fn get(&self) -> Option<&Arc<dyn ScoreModel>> {
        self.cell.get()
    }
}

#[cfg(feature = "diffusion")]
mod denoiser {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use candle_core::{DType, Device, Module, Tensor};
    use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
    use ndarray::Array3;
    use safetensors::SafeTensors;
    use tracing::debug;

    use super::ScoreModel;
    use crate::error::{DeblurError, Result};

    /// Hidden width of the residual denoiser.
    const HIDDEN: usize = 64;
    /// Number of hidden conv blocks.
    const DEPTH: usize = 8;
    /// Timesteps the published weights were trained with.
    const TRAIN_TIMESTEPS: usize = 1000;

    /// Small residual conv denoiser conditioned on the timestep through a
    /// broadcast timestep channel. Input: (1, 3+1, H, W) in [-1,1]; output:
    /// predicted noise (1, 3, H, W).
    pub struct ResidualDenoiser {
        conv_in: Conv2d,
        blocks: Vec<Conv2d>,
        conv_out: Conv2d,
        device: Device,
    }

    impl ResidualDenoiser {
        pub fn new(vb: VarBuilder) -> Result<Self> {
            let cfg = Conv2dConfig {
                padding: 1,
                ..Conv2dConfig::default()
            };
            let conv_in = conv2d(4, HIDDEN, 3, cfg, vb.pp("conv_in")).map_err(model_err)?;
            let mut blocks = Vec::with_capacity(DEPTH);
            for i in 0..DEPTH {
                let block =
                    conv2d(HIDDEN, HIDDEN, 3, cfg, vb.pp(format!("block{i}"))).map_err(model_err)?;
                blocks.push(block);
            }
            let conv_out = conv2d(HIDDEN, 3, 3, cfg, vb.pp("conv_out")).map_err(model_err)?;
            Ok(Self {
                conv_in,
                blocks,
                conv_out,
                device: vb.device().clone(),
            })
        }

        fn forward(&self, input: &Tensor) -> candle_core::Result<Tensor> {
            let mut hidden = self.conv_in.forward(input)?.relu()?;
            for block in &self.blocks {
                let out = block.forward(&hidden)?.relu()?;
                hidden = (hidden + out)?;
            }
            self.conv_out.forward(&hidden)
        }
    }

    impl ScoreModel for ResidualDenoiser {
        fn num_timesteps(&self) -> usize {
            TRAIN_TIMESTEPS
        }

        fn predict_noise(&self, rgb: &Array3<f32>, t_index: usize) -> Result<Array3<f32>> {
            let (ch, h, w) = rgb.dim();
            let data: Vec<f32> = rgb.iter().copied().collect();
            let input = Tensor::from_vec(data, (1, ch, h, w), &self.device).map_err(model_err)?;

            let t_norm = t_index as f64 / (TRAIN_TIMESTEPS - 1) as f64;
            let t_channel = Tensor::full(t_norm as f32, (1, 1, h, w), &self.device)
                .map_err(model_err)?;
            let input = Tensor::cat(&[&input, &t_channel], 1).map_err(model_err)?;

            let output = self.forward(&input).map_err(model_err)?;
            let flat = output
                .flatten_all()
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(model_err)?;
            Array3::from_shape_vec((ch, h, w), flat)
                .map_err(|e| DeblurError::Model(e.to_string()))
        }
    }

    /// Best available device for the score model. The solver's tensors stay
    /// on the CPU; only the denoiser pass runs on the accelerator.
    pub fn score_device() -> Device {
        #[cfg(feature = "cuda")]
        {
            if let Ok(device) = Device::new_cuda(0) {
                debug!("Using CUDA device for the score model");
                return device;
            }
        }
        debug!("Using CPU for the score model");
        Device::Cpu
    }

    /// Load the pretrained denoiser from a safetensors file.
    pub fn load_score_model(path: &Path, device: &Device) -> Result<Arc<dyn ScoreModel>> {
        debug!("Loading score model from {}", path.display());
        let data = std::fs::read(path)?;
        let tensors = SafeTensors::deserialize(&data)
            .map_err(|e| DeblurError::Model(format!("{}: {e}", path.display())))?;

        let mut tensor_map: HashMap<String, Tensor> = HashMap::new();
        for name in tensors.names() {
            let view = tensors
                .tensor(name)
                .map_err(|e| DeblurError::Model(format!("tensor {name}: {e}")))?;
            if view.dtype() != safetensors::Dtype::F32 {
                return Err(DeblurError::Model(format!(
                    "tensor {name}: expected f32 weights, got {:?}",
                    view.dtype()
                )));
            }
            let shape: Vec<usize> = view.shape().to_vec();
            let tensor = Tensor::from_raw_buffer(view.data(), DType::F32, &shape, device)
                .map_err(model_err)?;
            tensor_map.insert(name.to_string(), tensor);
        }

        let vb = VarBuilder::from_tensors(tensor_map, DType::F32, device);
        Ok(Arc::new(ResidualDenoiser::new(vb)?))
    }

    fn model_err(e: candle_core::Error) -> DeblurError {
        DeblurError::Model(e.to_string())
    }
}

#[cfg(feature = "diffusion")]
pub use denoiser::{load_score_model, score_device, ResidualDenoiser};
