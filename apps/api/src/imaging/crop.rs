//! Fixed-ratio crops: 1:1 for profile avatars, 4:5 for resume photos.

use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;

use crate::imaging::codec::{decode, encode_png, ImageData, ImageError};

/// Resume photo standard, width over height.
pub const RESUME_ASPECT: f64 = 4.0 / 5.0;

/// A crop window in source pixels. Always lies inside the image it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        img.crop_imm(self.x, self.y, self.width, self.height)
    }
}

/// Largest centred square.
pub fn center_square(width: u32, height: u32) -> CropRect {
    let side = width.min(height);
    CropRect {
        x: (width - side) / 2,
        y: (height - side) / 2,
        width: side,
        height: side,
    }
}

/// Largest centred window with `width / height == ratio`.
pub fn center_aspect(width: u32, height: u32, ratio: f64) -> CropRect {
    let current = width as f64 / height as f64;

    let (render_width, render_height) = if current > ratio {
        // Wider than the target: height is the limiting factor.
        let w = ((height as f64 * ratio).round() as u32).clamp(1, width);
        (w, height)
    } else {
        let h = ((width as f64 / ratio).round() as u32).clamp(1, height);
        (width, h)
    };

    CropRect {
        x: (width - render_width) / 2,
        y: (height - render_height) / 2,
        width: render_width,
        height: render_height,
    }
}

/// Dimensions after an aspect-preserving downscale so the longest side is at
/// most `max_side`. Never upscales.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side {
        return (width, height);
    }
    let scale = max_side as f64 / longest as f64;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

pub fn resize_to_fit(img: &DynamicImage, max_side: u32) -> DynamicImage {
    let (w, h) = fit_within(img.width(), img.height(), max_side);
    if (w, h) == (img.width(), img.height()) {
        return img.clone();
    }
    img.resize_exact(w, h, FilterType::Triangle)
}

/// Centred 1:1 PNG, as downloaded for LinkedIn.
pub fn crop_to_square(data: &[u8]) -> Result<ImageData, ImageError> {
    let img = decode(data)?;
    let rect = center_square(img.width(), img.height());
    encode_png(&rect.apply(&img))
}

/// Centred 4:5 PNG, as downloaded for resumes.
pub fn crop_to_resume_aspect(data: &[u8]) -> Result<ImageData, ImageError> {
    let img = decode(data)?;
    let rect = center_aspect(img.width(), img.height(), RESUME_ASPECT);
    encode_png(&rect.apply(&img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::test_support::png_of_size;

    #[test]
    fn test_center_square_landscape() {
        assert_eq!(
            center_square(1920, 1080),
            CropRect { x: 420, y: 0, width: 1080, height: 1080 }
        );
    }

    #[test]
    fn test_center_square_portrait() {
        assert_eq!(
            center_square(600, 1000),
            CropRect { x: 0, y: 200, width: 600, height: 600 }
        );
    }

    #[test]
    fn test_resume_aspect_on_wide_image_limits_height() {
        let rect = center_aspect(1000, 1000, RESUME_ASPECT);
        assert_eq!(rect, CropRect { x: 100, y: 0, width: 800, height: 1000 });
    }

    #[test]
    fn test_resume_aspect_on_tall_image_limits_width() {
        let rect = center_aspect(800, 1600, RESUME_ASPECT);
        assert_eq!(rect, CropRect { x: 0, y: 300, width: 800, height: 1000 });
    }

    #[test]
    fn test_resume_aspect_exact_ratio_is_identity() {
        let rect = center_aspect(400, 500, RESUME_ASPECT);
        assert_eq!(rect, CropRect { x: 0, y: 0, width: 400, height: 500 });
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(300, 200, 768), (300, 200));
        assert_eq!(fit_within(2000, 1000, 1000), (1000, 500));
        assert_eq!(fit_within(1000, 3000, 768), (256, 768));
    }

    #[test]
    fn test_crop_to_square_output_dimensions() {
        let out = crop_to_square(png_of_size(50, 30).bytes()).unwrap();
        let img = decode(out.bytes()).unwrap();
        assert_eq!((img.width(), img.height()), (30, 30));
        assert_eq!(out.mime_type(), "image/png");
    }

    #[test]
    fn test_crop_to_resume_aspect_output_dimensions() {
        let out = crop_to_resume_aspect(png_of_size(100, 100).bytes()).unwrap();
        let img = decode(out.bytes()).unwrap();
        assert_eq!((img.width(), img.height()), (80, 100));
    }
}
