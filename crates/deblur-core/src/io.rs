//! Grayscale image I/O in the [0,1] float convention used by the solver.

use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::{Array2, ArrayView2};

use crate::error::Result;
use crate::tensor::{image_to_tensor, Tensor};

/// Load a grayscale image file into a [0,1] float plane.
pub fn load_grayscale(path: &Path) -> Result<Array2<f32>> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut data = Array2::<f32>::zeros((h as usize, w as usize));

    for row in 0..h as usize {
        for col in 0..w as usize {
            let pixel = gray.get_pixel(col as u32, row as u32);
            data[[row, col]] = pixel.0[0] as f32 / 65535.0;
        }
    }
    Ok(data)
}

/// Load a grayscale image directly into the (1,1,H,W) measurement layout.
pub fn load_measurement(path: &Path) -> Result<Tensor> {
    Ok(image_to_tensor(load_grayscale(path)?))
}

/// Save a plane as 8-bit grayscale PNG.
pub fn save_png(plane: &ArrayView2<f32>, path: &Path) -> Result<()> {
    let (h, w) = plane.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let val = (plane[[row, col]].clamp(0.0, 1.0) * 255.0) as u8;
            img.put_pixel(col as u32, row as u32, Luma([val]));
        }
    }
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a plane as 16-bit grayscale TIFF.
pub fn save_tiff(plane: &ArrayView2<f32>, path: &Path) -> Result<()> {
    let (h, w) = plane.dim();
    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            pixels.push((plane[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16);
        }
    }
    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .expect("buffer size matches dimensions");
    img.save(path)?;
    Ok(())
}

/// Save a plane, choosing the format from the file extension.
pub fn save_grayscale(plane: &ArrayView2<f32>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tiff" | "tif") => save_tiff(plane, path),
        Some("png") => save_png(plane, path),
        _ => save_tiff(plane, path),
    }
}
