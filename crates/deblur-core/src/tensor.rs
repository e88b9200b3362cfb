use ndarray::{s, Array2, Array4, ArrayView2};

use crate::error::{DeblurError, Result};

/// Image-domain tensors follow the (batch, channel, height, width) layout.
/// Measurements and image estimates are (1, 1, H, W); kernels are
/// (1, 1, Kh, Kw) with odd spatial dimensions.
pub type Tensor = Array4<f32>;

/// Wrap a 2D grayscale plane into the (1,1,H,W) tensor layout.
pub fn image_to_tensor(plane: Array2<f32>) -> Tensor {
    let (h, w) = plane.dim();
    plane
        .into_shape_with_order((1, 1, h, w))
        .expect("2D plane reshapes losslessly to (1,1,H,W)")
}

/// Wrap a 2D PSF into the (1,1,Kh,Kw) tensor layout.
pub fn kernel_to_tensor(psf: Array2<f32>) -> Tensor {
    image_to_tensor(psf)
}

/// View the single (batch 0, channel 0) spatial plane of a tensor.
pub fn plane(t: &Tensor) -> ArrayView2<'_, f32> {
    t.slice(s![0, 0, .., ..])
}

/// Spatial dimensions (H, W) of a tensor.
pub fn spatial_dims(t: &Tensor) -> (usize, usize) {
    let shape = t.shape();
    (shape[2], shape[3])
}

/// Check the single-channel contract for an image-domain tensor.
pub fn validate_image(x: &Tensor) -> Result<()> {
    if x.shape()[1] != 1 {
        return Err(DeblurError::InvalidImageShape {
            got: x.shape().to_vec(),
        });
    }
    Ok(())
}

/// Check the (1,1,Kh,Kw) contract for a kernel tensor.
pub fn validate_kernel(k: &Tensor) -> Result<()> {
    if k.shape()[0] != 1 || k.shape()[1] != 1 {
        return Err(DeblurError::InvalidKernelShape {
            got: k.shape().to_vec(),
        });
    }
    Ok(())
}

/// Check the full measurement contract: single channel and batch size 1.
pub fn validate_measurement(y: &Tensor) -> Result<()> {
    validate_image(y)?;
    if y.shape()[0] != 1 {
        return Err(DeblurError::UnsupportedBatch { got: y.shape()[0] });
    }
    Ok(())
}
