use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use crate::imaging::ImageData;

/// File extension matching an image MIME type.
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// Serves an image inline.
pub fn inline_image(image: &ImageData) -> Response {
    (
        [(header::CONTENT_TYPE, image.mime_type().to_string())],
        image.to_bytes(),
    )
        .into_response()
}

/// Serves an image as a download named `{stem}.{ext}`.
pub fn attachment(image: &ImageData, stem: &str) -> Response {
    let disposition = format!(
        "attachment; filename=\"{stem}.{}\"",
        extension_for(image.mime_type())
    );
    (
        [
            (header::CONTENT_TYPE, image.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        image.to_bytes(),
    )
        .into_response()
}
