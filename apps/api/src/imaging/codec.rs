//! Encoded image payloads and the decode/encode boundary.
//!
//! Everything that crosses an API boundary (uploads, Gemini responses, downloads)
//! travels as `ImageData`: the encoded bytes plus their MIME type. Pixel work
//! happens on `DynamicImage` only between `decode` and one of the `encode_*` calls.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported or corrupt image: {0}")]
    Decode(image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),

    #[error("Image has zero width or height")]
    Empty,

    #[error("Could not read image data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An encoded image and its MIME type. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Bytes,
    mime_type: String,
}

impl ImageData {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the payload, for response bodies.
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:<mime>;base64,<payload>`, used to embed images into SVG.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

/// Detects the MIME type of a supported image from its magic bytes.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        format @ (ImageFormat::Jpeg
        | ImageFormat::Png
        | ImageFormat::WebP
        | ImageFormat::Gif
        | ImageFormat::Bmp) => Some(format.to_mime_type()),
        _ => None,
    }
}

/// Decodes an image and applies its EXIF orientation so that width/height
/// match what a viewer would display.
pub fn decode(data: &[u8]) -> Result<DynamicImage, ImageError> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let mut decoder = reader.into_decoder().map_err(ImageError::Decode)?;
    let orientation = decoder.orientation().map_err(ImageError::Decode)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(ImageError::Decode)?;
    img.apply_orientation(orientation);

    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::Empty);
    }
    Ok(img)
}

pub fn encode_png(img: &DynamicImage) -> Result<ImageData, ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(ImageError::Encode)?;
    Ok(ImageData::new(buf, "image/png"))
}

/// JPEG has no alpha channel; transparent pixels are flattened to their colour.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<ImageData, ImageError> {
    let mut buf = Vec::new();
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(ImageError::Encode)?;
    Ok(ImageData::new(buf, "image/jpeg"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, Rgb, RgbImage};

    use super::{encode_png, ImageData};

    /// Solid-colour PNG of the given size.
    pub fn png_of_size(width: u32, height: u32) -> ImageData {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 90, 60]));
        encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
    }
}
