//! Image file loading and saving as 16-bit arrays.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Luma, Rgb};
use ndarray::Array3;
use softstretch::Image16;

/// Load an image file as 16-bit grayscale or RGB.
///
/// Colour images become 3 channels, everything else 1. Lower bit depths are
/// scaled up to the full 16-bit range.
pub fn load_image(path: &Path) -> Result<Image16> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let pixels = if img.color().has_color() {
        let raw = img.into_rgb16().into_raw();
        Array3::from_shape_vec((height, width, 3), raw)?
    } else {
        let raw = img.into_luma16().into_raw();
        Array3::from_shape_vec((height, width, 1), raw)?
    };

    Ok(Image16::new(pixels)?)
}

/// Save a 16-bit image; the format follows the file extension.
pub fn save_image(image: &Image16, path: &Path) -> Result<()> {
    let view = image.view();
    let (height, width, channels) = view.dim();
    let raw: Vec<u16> = view.iter().copied().collect();

    let result = match channels {
        1 => ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width as u32, height as u32, raw)
            .ok_or_else(|| anyhow!("Pixel buffer does not match {width}x{height}"))?
            .save(path),
        3 => ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(width as u32, height as u32, raw)
            .ok_or_else(|| anyhow!("Pixel buffer does not match {width}x{height}"))?
            .save(path),
        n => return Err(anyhow!("Cannot save an image with {n} channels")),
    };

    result.with_context(|| format!("Failed to save {}", path.display()))
}
