//! Face detection seam used by the smart crop.
//!
//! `AppState` holds an `Arc<dyn FaceDetector>`, chosen at startup from
//! `FACE_DETECTION`. Boxes are returned in unit coordinates (0.0 – 1.0 of the
//! image they were detected on) so callers can run detection on a downscaled
//! copy and map the result back onto the full-size source.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::gemini_client::prompts::JSON_ONLY_SYSTEM;
use crate::gemini_client::GeminiClient;
use crate::imaging::smart_crop::FaceBox;
use crate::imaging::ImageData;

const FACE_DETECTION_PROMPT: &str = "Detect every human face in this photo. \
Return a JSON array where each element is {\"label\": \"face\", \"box_2d\": [ymin, xmin, ymax, xmax]} \
with coordinates normalized to 0-1000. Return [] if there is no face.";

/// Scale Gemini uses for `box_2d` coordinates.
const BOX_SCALE: f64 = 1000.0;

#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Face boxes in unit coordinates. Empty when no face is visible.
    async fn detect(&self, image: &ImageData) -> Result<Vec<FaceBox>>;

    /// When false the smart crop skips detection and centre-crops instead.
    fn enabled(&self) -> bool {
        true
    }
}

/// Detection switched off: uploads are centre-cropped.
pub struct DisabledFaceDetector;

#[async_trait]
impl FaceDetector for DisabledFaceDetector {
    async fn detect(&self, _image: &ImageData) -> Result<Vec<FaceBox>> {
        Ok(Vec::new())
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Asks the Gemini vision model for face bounding boxes.
pub struct GeminiFaceDetector(pub GeminiClient);

#[derive(Debug, Deserialize)]
struct DetectedFace {
    box_2d: [f64; 4],
}

#[async_trait]
impl FaceDetector for GeminiFaceDetector {
    async fn detect(&self, image: &ImageData) -> Result<Vec<FaceBox>> {
        let detected: Vec<DetectedFace> = self
            .0
            .call_json(image, FACE_DETECTION_PROMPT, JSON_ONLY_SYSTEM)
            .await?;
        Ok(faces_from_boxes(&detected))
    }
}

/// Converts `[ymin, xmin, ymax, xmax]` boxes on the 0–1000 grid to unit boxes,
/// dropping inverted or empty ones.
fn faces_from_boxes(detected: &[DetectedFace]) -> Vec<FaceBox> {
    detected
        .iter()
        .filter_map(|face| {
            let [ymin, xmin, ymax, xmax] = face.box_2d;
            let width = (xmax - xmin) / BOX_SCALE;
            let height = (ymax - ymin) / BOX_SCALE;
            (width > 0.0 && height > 0.0).then(|| FaceBox {
                x: xmin / BOX_SCALE,
                y: ymin / BOX_SCALE,
                width,
                height,
            })
        })
        .collect()
}
