// yolo-detect 🚀 AGPL-3.0 License

//! Image sources for the command line.
//!
//! A source is either a single image file or a directory of images; images
//! are decoded to 8-bit RGB.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{DetectError, Result};

/// Extensions decoded by the enabled `image` codecs.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Resolve `source` to a sorted list of image paths.
///
/// # Errors
///
/// Returns [`DetectError::Io`] if the path doesn't exist or a directory can't
/// be read, and [`DetectError::Image`] if a file has an unsupported extension.
pub fn collect_images<P: AsRef<Path>>(source: P) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();

    if source.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(source)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_image_file(path))
            .collect();

        paths.sort();
        return Ok(paths);
    }

    if !source.exists() {
        return Err(DetectError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Source not found: {}", source.display()),
        )));
    }

    if !is_image_file(source) {
        return Err(DetectError::Image(format!(
            "Unsupported image format: {}",
            source.display()
        )));
    }

    Ok(vec![source.to_path_buf()])
}

/// Decode an image file to RGB.
///
/// # Errors
///
/// Returns [`DetectError::Image`] if the file can't be opened or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|e| {
        DetectError::Image(format!("Failed to load image {}: {e}", path.display()))
    })?;
    Ok(img.to_rgb8())
}

/// Check if a path is an image file based on extension.
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}
