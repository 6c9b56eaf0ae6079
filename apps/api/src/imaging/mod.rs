// Image pre-processing: decode/encode, fixed-ratio crops, face-aware smart crop.
// CPU-bound work must run inside tokio::task::spawn_blocking when called from handlers.

pub mod codec;
pub mod crop;
pub mod face_detection;
pub mod smart_crop;

pub use codec::{ImageData, ImageError};
