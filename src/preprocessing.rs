// yolo-detect 🚀 AGPL-3.0 License

//! Image preprocessing for YOLO inference.
//!
//! This module handles the two operations needed before running the model:
//! letterboxing an arbitrary-resolution image into the fixed square input,
//! and converting the padded canvas into a planar, normalized tensor.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]

use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use rayon::prelude::*;

use crate::error::{DetectError, Result};

// ================================================================================================
// Constants
// ================================================================================================

/// Letterbox padding color (gray).
///
/// Must match the fill the detection model was trained with.
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Channel divisor. Inputs are plain `[0, 1]` intensities, no mean/std.
const PIXEL_SCALE: f32 = 255.0;

// ================================================================================================
// Types
// ================================================================================================

/// Parameters of a letterbox transform, sufficient to invert it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxParams {
    /// Uniform scale factor from source to canvas.
    pub scale: f32,
    /// Horizontal offset of the resized content within the canvas.
    pub pad_x: f32,
    /// Vertical offset of the resized content within the canvas.
    pub pad_y: f32,
    /// Width of the resized content.
    pub new_width: u32,
    /// Height of the resized content.
    pub new_height: u32,
    /// Original image width.
    pub source_width: u32,
    /// Original image height.
    pub source_height: u32,
    /// Side of the square canvas.
    pub target_size: u32,
}

/// A letterboxed canvas plus the transform that produced it.
///
/// Produced once per input image and consumed by the decode/unmap stage of
/// the same pipeline invocation.
#[derive(Debug, Clone)]
pub struct LetterboxResult {
    /// `target_size x target_size` RGB canvas.
    pub canvas: RgbImage,
    /// Transform parameters.
    pub params: LetterboxParams,
}

// ================================================================================================
// Letterbox
// ================================================================================================

/// Calculate letterbox parameters for resizing.
///
/// `scale = min(target / width, target / height)`, content dimensions are
/// rounded (at least 1 pixel) and centered with integer offsets.
///
/// # Errors
///
/// Returns [`DetectError::InvalidImage`] if either source dimension is zero,
/// and [`DetectError::Config`] if `target_size` is zero.
pub fn calculate_letterbox_params(
    source_width: u32,
    source_height: u32,
    target_size: u32,
) -> Result<LetterboxParams> {
    if source_width == 0 || source_height == 0 {
        return Err(DetectError::InvalidImage(format!(
            "image must be at least 1x1, got {source_width}x{source_height}"
        )));
    }
    if target_size == 0 {
        return Err(DetectError::Config("target_size must be at least 1".to_string()));
    }

    let target = target_size as f32;
    let (w, h) = (source_width as f32, source_height as f32);
    let scale = (target / w).min(target / h);

    let new_width = ((w * scale).round() as u32).clamp(1, target_size);
    let new_height = ((h * scale).round() as u32).clamp(1, target_size);

    // Integer division: the fractional remainder is truncated.
    let pad_x = (target_size - new_width) / 2;
    let pad_y = (target_size - new_height) / 2;

    Ok(LetterboxParams {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        new_width,
        new_height,
        source_width,
        source_height,
        target_size,
    })
}

/// Letterbox an image into a `target_size x target_size` canvas.
///
/// The image is resampled with a bilinear convolution filter, then drawn
/// centered on a canvas filled with [`LETTERBOX_COLOR`].
///
/// # Errors
///
/// Returns [`DetectError::InvalidImage`] for zero-sized images and
/// [`DetectError::Image`] if resampling fails.
pub fn letterbox(image: &RgbImage, target_size: u32) -> Result<LetterboxResult> {
    let params = calculate_letterbox_params(image.width(), image.height(), target_size)?;

    let mut canvas = RgbImage::from_pixel(target_size, target_size, Rgb(LETTERBOX_COLOR));
    let (x, y) = (i64::from(params.pad_x as u32), i64::from(params.pad_y as u32));

    if params.new_width == image.width() && params.new_height == image.height() {
        image::imageops::replace(&mut canvas, image, x, y);
    } else {
        let resized = resize_rgb(image, params.new_width, params.new_height)?;
        image::imageops::replace(&mut canvas, &resized, x, y);
    }

    Ok(LetterboxResult { canvas, params })
}

/// Resample an RGB image to `(width, height)`.
fn resize_rgb(image: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let src = ImageRef::new(image.width(), image.height(), image.as_raw(), PixelType::U8x3)
        .map_err(|e| DetectError::Image(format!("Failed to wrap source image: {e}")))?;
    let mut dst = Image::new(width, height, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|e| DetectError::Image(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| DetectError::Image("Failed to create resized buffer".to_string()))
}

// ================================================================================================
// Tensor encoding
// ================================================================================================

/// Convert an RGB canvas to a normalized NCHW tensor with shape `(1, 3, H, W)`.
///
/// All red values come first, then green, then blue; each plane is row-major
/// and every value is `intensity / 255`.
///
/// # Errors
///
/// Returns [`DetectError::Image`] if the tensor cannot be shaped.
pub fn encode(canvas: &RgbImage) -> Result<Array4<f32>> {
    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    let mut data = vec![0.0f32; 3 * h * w];
    encode_into(canvas, &mut data)?;

    Array4::from_shape_vec((1, 3, h, w), data)
        .map_err(|e| DetectError::Image(format!("Failed to shape input tensor: {e}")))
}

/// Write the planar encoding of `canvas` into a caller-owned buffer.
///
/// Lets per-frame callers reuse one allocation across frames.
///
/// # Errors
///
/// Returns [`DetectError::Image`] if `out` is not exactly `3 * H * W` long.
pub fn encode_into(canvas: &RgbImage, out: &mut [f32]) -> Result<()> {
    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    let plane = h * w;
    if out.len() != 3 * plane {
        return Err(DetectError::Image(format!(
            "tensor buffer holds {} values, expected {}",
            out.len(),
            3 * plane
        )));
    }
    if plane == 0 {
        return Ok(());
    }

    let (r_plane, rest) = out.split_at_mut(plane);
    let (g_plane, b_plane) = rest.split_at_mut(plane);

    r_plane
        .par_chunks_mut(w)
        .zip(g_plane.par_chunks_mut(w))
        .zip(b_plane.par_chunks_mut(w))
        .zip(canvas.as_raw().par_chunks_exact(w * 3))
        .for_each(|(((r_row, g_row), b_row), src_row)| {
            for (x, px) in src_row.chunks_exact(3).enumerate() {
                r_row[x] = f32::from(px[0]) / PIXEL_SCALE;
                g_row[x] = f32::from(px[1]) / PIXEL_SCALE;
                b_row[x] = f32::from(px[2]) / PIXEL_SCALE;
            }
        });

    Ok(())
}
