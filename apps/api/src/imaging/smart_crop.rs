//! Smart crop — frames an uploaded selfie as a square head-and-shoulders shot.
//!
//! # Algorithm
//! 1. Detection disabled → centre square, resized to `HEADSHOT_SIZE`.
//! 2. Otherwise detect faces on a copy no larger than `DETECTION_MAX_SIDE`,
//!    map the boxes back to source pixels and keep the largest.
//! 3. No face (or a detector failure) → the upload is returned untouched.
//! 4. Face found → square of `max(face_w, face_h) × FACE_EXPANSION`, clamped
//!    to the short side, centred horizontally on the face with the face centre
//!    at `FACE_CENTER_Y` of the window height, clamped to image bounds.
//!
//! Decoding, resizing and encoding run on the blocking pool.

use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::imaging::codec::{decode, encode_jpeg, ImageData, ImageError};
use crate::imaging::crop::{center_square, resize_to_fit, CropRect};
use crate::imaging::face_detection::FaceDetector;

/// Output edge length of a cropped headshot.
pub const HEADSHOT_SIZE: u32 = 1024;
/// Crop side relative to the larger face dimension.
pub const FACE_EXPANSION: f64 = 2.2;
/// Vertical position of the face centre inside the crop (0 = top).
pub const FACE_CENTER_Y: f64 = 0.42;
/// Longest side of the copy sent to the detector.
pub const DETECTION_MAX_SIDE: u32 = 768;
const HEADSHOT_JPEG_QUALITY: u8 = 95;
const DETECTION_JPEG_QUALITY: u8 = 85;

/// An axis-aligned face box. Units depend on context: unit coordinates from a
/// detector, pixels once mapped onto a source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMethod {
    Face,
    Center,
    None,
}

#[derive(Debug, Clone)]
pub struct SmartCropOutcome {
    pub image: ImageData,
    pub was_cropped: bool,
    pub method: CropMethod,
}

impl SmartCropOutcome {
    fn unchanged(original: ImageData) -> Self {
        Self {
            image: original,
            was_cropped: false,
            method: CropMethod::None,
        }
    }
}

/// Maps unit-coordinate boxes onto a `width`×`height` image, clamps them to
/// its bounds and returns the largest. Boxes entirely outside are ignored.
pub fn largest_face(faces: &[FaceBox], width: u32, height: u32) -> Option<FaceBox> {
    let (w, h) = (width as f64, height as f64);

    faces
        .iter()
        .filter_map(|face| {
            let x0 = (face.x * w).max(0.0);
            let y0 = (face.y * h).max(0.0);
            let x1 = ((face.x + face.width) * w).min(w);
            let y1 = ((face.y + face.height) * h).min(h);
            (x1 > x0 && y1 > y0).then(|| FaceBox {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
            })
        })
        .max_by(|a, b| a.area().total_cmp(&b.area()))
}

/// Square crop window around a face given in source pixels.
pub fn face_window(width: u32, height: u32, face: &FaceBox) -> CropRect {
    let short_side = width.min(height) as f64;
    let side = (face.width.max(face.height) * FACE_EXPANSION)
        .round()
        .clamp(1.0, short_side);

    let (cx, cy) = face.center();
    let x = (cx - side / 2.0).clamp(0.0, width as f64 - side);
    let y = (cy - side * FACE_CENTER_Y).clamp(0.0, height as f64 - side);

    let side = side as u32;
    CropRect {
        x: (x.round() as u32).min(width - side),
        y: (y.round() as u32).min(height - side),
        width: side,
        height: side,
    }
}

/// Crops, scales to `HEADSHOT_SIZE` square and encodes as JPEG.
fn render_headshot(img: &DynamicImage, rect: CropRect) -> Result<ImageData, ImageError> {
    let square = rect
        .apply(img)
        .resize_exact(HEADSHOT_SIZE, HEADSHOT_SIZE, FilterType::Lanczos3);
    encode_jpeg(&square, HEADSHOT_JPEG_QUALITY)
}

/// Frames an upload for generation. Fails only when the upload does not decode.
pub async fn smart_crop(
    original: ImageData,
    detector: &dyn FaceDetector,
) -> Result<SmartCropOutcome, ImageError> {
    let detect = detector.enabled();
    let data = original.clone();

    let (img, probe) = tokio::task::spawn_blocking(move || -> Result<_, ImageError> {
        let img = decode(data.bytes())?;
        let probe = if detect {
            let small = resize_to_fit(&img, DETECTION_MAX_SIDE);
            Some(encode_jpeg(&small, DETECTION_JPEG_QUALITY)?)
        } else {
            None
        };
        Ok((img, probe))
    })
    .await??;

    let Some(probe) = probe else {
        let rect = center_square(img.width(), img.height());
        let image = tokio::task::spawn_blocking(move || render_headshot(&img, rect)).await??;
        return Ok(SmartCropOutcome {
            image,
            was_cropped: true,
            method: CropMethod::Center,
        });
    };

    let faces = match detector.detect(&probe).await {
        Ok(faces) => faces,
        Err(e) => {
            warn!("Face detection failed, keeping original upload: {e:#}");
            return Ok(SmartCropOutcome::unchanged(original));
        }
    };

    let Some(face) = largest_face(&faces, img.width(), img.height()) else {
        info!("No face detected among {} candidates, keeping original upload", faces.len());
        return Ok(SmartCropOutcome::unchanged(original));
    };

    let rect = face_window(img.width(), img.height(), &face);
    debug!(
        "Face-centred crop: face={:?} window={:?} source={}x{}",
        face,
        rect,
        img.width(),
        img.height()
    );

    let image = tokio::task::spawn_blocking(move || render_headshot(&img, rect)).await??;
    Ok(SmartCropOutcome {
        image,
        was_cropped: true,
        method: CropMethod::Face,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::test_support::png_of_size;
    use crate::imaging::face_detection::DisabledFaceDetector;
    use async_trait::async_trait;

    struct FixedDetector(anyhow::Result<Vec<FaceBox>>);

    #[async_trait]
    impl FaceDetector for FixedDetector {
        async fn detect(&self, _image: &ImageData) -> anyhow::Result<Vec<FaceBox>> {
            match &self.0 {
                Ok(faces) => Ok(faces.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn face(x: f64, y: f64, width: f64, height: f64) -> FaceBox {
        FaceBox { x, y, width, height }
    }

    #[test]
    fn test_window_centres_face_with_headroom() {
        let rect = face_window(1000, 1000, &face(450.0, 300.0, 100.0, 100.0));
        // side = 220, face centre (500, 350) sits at 42% of the window height
        assert_eq!(rect, CropRect { x: 390, y: 258, width: 220, height: 220 });
    }

    #[test]
    fn test_window_clamped_at_top_left_corner() {
        let rect = face_window(1000, 800, &face(0.0, 0.0, 100.0, 120.0));
        assert_eq!((rect.x, rect.y), (0, 0));
        assert_eq!(rect.width, 264);
    }

    #[test]
    fn test_window_clamped_at_bottom_right_corner() {
        let rect = face_window(1000, 800, &face(950.0, 760.0, 50.0, 40.0));
        assert_eq!(rect.width, 110);
        assert_eq!(rect.x + rect.width, 1000);
        assert_eq!(rect.y + rect.height, 800);
    }

    #[test]
    fn test_window_never_exceeds_short_side() {
        let rect = face_window(1000, 600, &face(0.0, 0.0, 800.0, 800.0));
        assert_eq!(rect.width, 600);
        assert_eq!(rect.height, 600);
        assert!(rect.x + rect.width <= 1000);
        assert_eq!(rect.y, 0);
    }

    #[test]
    fn test_largest_face_maps_unit_boxes_to_pixels() {
        let faces = vec![face(0.1, 0.1, 0.1, 0.1), face(0.5, 0.2, 0.25, 0.3)];
        let best = largest_face(&faces, 2000, 1000).unwrap();
        assert_eq!(best, face(1000.0, 200.0, 500.0, 300.0));
    }

    #[test]
    fn test_largest_face_clamps_and_ignores_outside_boxes() {
        let faces = vec![face(1.2, 0.0, 0.3, 0.3), face(0.9, 0.9, 0.2, 0.2)];
        let best = largest_face(&faces, 100, 100).unwrap();
        assert!((best.width - 10.0).abs() < 1e-9);
        assert!((best.height - 10.0).abs() < 1e-9);
        assert!(largest_face(&[face(1.5, 1.5, 0.1, 0.1)], 100, 100).is_none());
    }

    #[tokio::test]
    async fn test_disabled_detection_centre_crops_to_headshot_size() {
        let outcome = smart_crop(png_of_size(300, 200), &DisabledFaceDetector)
            .await
            .unwrap();
        assert!(outcome.was_cropped);
        assert_eq!(outcome.method, CropMethod::Center);
        assert_eq!(outcome.image.mime_type(), "image/jpeg");
        let img = decode(outcome.image.bytes()).unwrap();
        assert_eq!((img.width(), img.height()), (HEADSHOT_SIZE, HEADSHOT_SIZE));
    }

    #[tokio::test]
    async fn test_detected_face_crops_around_it() {
        let detector = FixedDetector(Ok(vec![face(0.4, 0.3, 0.2, 0.2)]));
        let outcome = smart_crop(png_of_size(400, 400), &detector).await.unwrap();
        assert!(outcome.was_cropped);
        assert_eq!(outcome.method, CropMethod::Face);
        let img = decode(outcome.image.bytes()).unwrap();
        assert_eq!(img.width(), HEADSHOT_SIZE);
    }

    #[tokio::test]
    async fn test_no_face_returns_original() {
        let original = png_of_size(64, 48);
        let outcome = smart_crop(original.clone(), &FixedDetector(Ok(vec![])))
            .await
            .unwrap();
        assert!(!outcome.was_cropped);
        assert_eq!(outcome.method, CropMethod::None);
        assert_eq!(outcome.image, original);
    }

    #[tokio::test]
    async fn test_detector_failure_returns_original() {
        let original = png_of_size(64, 48);
        let detector = FixedDetector(Err(anyhow::anyhow!("quota")));
        let outcome = smart_crop(original.clone(), &detector).await.unwrap();
        assert!(!outcome.was_cropped);
        assert_eq!(outcome.image, original);
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_an_error() {
        let bogus = ImageData::new(b"not an image".to_vec(), "image/png");
        assert!(smart_crop(bogus, &DisabledFaceDetector).await.is_err());
    }
}
