//! In-place image downscaling
//!
//! The resized image is written to a sibling temporary file and renamed over the
//! original, so a failed resize leaves the full-size capture untouched.

use image::imageops::FilterType;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid source dimensions {0}x{1}")]
    EmptyImage(u32, u32),
}

/// Rescales an image file in place to `target_width`, preserving aspect ratio.
/// Returns the new dimensions.
#[cfg_attr(test, mockall::automock)]
pub trait ImageResizer: Send + Sync {
    fn resize_to_width(&self, path: &Path, target_width: u32) -> Result<(u32, u32), ResizeError>;
}

/// [`ImageResizer`] backed by the `image` crate using a Lanczos3 filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanczosResizer;

impl ImageResizer for LanczosResizer {
    fn resize_to_width(&self, path: &Path, target_width: u32) -> Result<(u32, u32), ResizeError> {
        let img = image::open(path)?;
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(ResizeError::EmptyImage(width, height));
        }

        let new_height = scaled_height(width, height, target_width);
        let resized = img.resize_exact(target_width, new_height, FilterType::Lanczos3);

        let staging = staging_path(path);
        if let Err(e) = resized.save_with_format(&staging, ImageFormat::Png) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        std::fs::rename(&staging, path)?;

        Ok((target_width, new_height))
    }
}

fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let ratio = target_width as f64 / width as f64;
    ((height as f64 * ratio) as u32).max(1)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".resizing");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_scaled_height_preserves_aspect() {
        assert_eq!(scaled_height(1920, 1080, 500), 281);
        assert_eq!(scaled_height(1000, 600, 500), 300);
        assert_eq!(scaled_height(4000, 1, 500), 1);
    }

    #[test]
    fn test_resize_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_com.png");
        RgbImage::from_pixel(1000, 600, Rgb([10, 20, 30]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let dims = LanczosResizer.resize_to_width(&path, 500).unwrap();
        assert_eq!(dims, (500, 300));
        assert_eq!(image::image_dimensions(&path).unwrap(), (500, 300));
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_resize_corrupt_file_leaves_it_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let err = LanczosResizer.resize_to_width(&path, 500).unwrap_err();
        assert!(matches!(err, ResizeError::Image(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"not a png");
    }
}
