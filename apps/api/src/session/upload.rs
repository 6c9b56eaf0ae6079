//! Source photo intake: multipart uploads and URL imports.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use reqwest::{redirect, Url};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::imaging::codec::sniff_mime;
use crate::imaging::{ImageData, ImageError};

pub const INVALID_IMAGE_MESSAGE: &str = "Please upload a valid image file (JPG, PNG, WebP).";
pub const URL_LOAD_FAILED_MESSAGE: &str =
    "Failed to load image. The URL might be broken or blocking access.";

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "image";
const URL_IMPORT_TIMEOUT_SECS: u64 = 20;
/// Redirects are followed by hand so every hop goes through the host check.
const MAX_REDIRECTS: usize = 3;

fn too_large(max_bytes: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "Image is too large. Please upload an image under {}MB.",
        max_bytes / (1024 * 1024)
    ))
}

/// Checks size and magic bytes. The declared content type is only used to
/// reject obvious non-images early; the sniffed type is what gets stored.
pub fn validate_upload(
    bytes: Bytes,
    declared_mime: Option<&str>,
    max_bytes: usize,
) -> Result<ImageData, AppError> {
    if let Some(mime) = declared_mime {
        if !mime.starts_with("image/") && mime != "application/octet-stream" {
            return Err(AppError::Validation(INVALID_IMAGE_MESSAGE.to_string()));
        }
    }
    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }
    let mime = sniff_mime(&bytes)
        .ok_or_else(|| AppError::Validation(INVALID_IMAGE_MESSAGE.to_string()))?;
    Ok(ImageData::new(bytes, mime))
}

/// The request body limit surfaces as a multipart error mid-stream.
fn multipart_error(error: MultipartError, max_bytes: usize, context: &str) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_bytes);
    }
    AppError::Validation(format!("{context}: {}", error.body_text()))
}

/// Buffers one field, stopping as soon as it grows past `max_bytes`.
async fn read_field_capped(mut field: Field<'_>, max_bytes: usize) -> Result<Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes, "Failed to read upload"))?
    {
        if buf.len() + chunk.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Reads the `image` field of a multipart body.
pub async fn read_multipart_image(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<ImageData, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes, "Malformed multipart body"))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let declared = field.content_type().map(str::to_string);
        let bytes = read_field_capped(field, max_bytes).await?;
        debug!(
            "Received upload: {} bytes, declared type {:?}",
            bytes.len(),
            declared
        );
        return validate_upload(bytes, declared.as_deref(), max_bytes);
    }

    Err(AppError::Validation(format!(
        "Missing '{IMAGE_FIELD}' field in upload"
    )))
}

// ────────────────────────────────────────────────────────────────────────────
// URL import
// ────────────────────────────────────────────────────────────────────────────

/// Client for URL imports. Redirects are disabled here and followed in
/// `fetch_image_from_url` after re-checking the target host.
pub fn url_import_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_secs(URL_IMPORT_TIMEOUT_SECS))
        .build()
}

/// Addresses a URL import must never reach: loopback, private, link-local
/// (cloud metadata lives at 169.254.169.254), CGNAT, multicast and unspecified.
pub fn is_disallowed_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_disallowed_ipv4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_disallowed_ipv4(v4),
            None => is_disallowed_ipv6(v6),
        },
    }
}

fn is_disallowed_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        || a == 0
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_disallowed_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

fn invalid_url() -> AppError {
    AppError::Validation("Enter a valid http(s) image URL".to_string())
}

/// Rejects non-http(s) URLs and hosts that resolve to internal addresses.
async fn check_import_target(url: &Url, allow_private: bool) -> Result<(), AppError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid_url());
    }
    if allow_private {
        return Ok(());
    }

    let host = url.host_str().ok_or_else(invalid_url)?;
    let port = url.port_or_known_default().unwrap_or(80);
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<IpAddr> = match literal.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| {
                warn!("Image URL host {host} did not resolve: {e}");
                AppError::Validation(URL_LOAD_FAILED_MESSAGE.to_string())
            })?
            .map(|addr| addr.ip())
            .collect(),
    };

    if addrs.is_empty() || addrs.into_iter().any(is_disallowed_ip) {
        warn!("Refusing image import from internal address: {url}");
        return Err(AppError::Validation(
            "Images can only be imported from public addresses".to_string(),
        ));
    }
    Ok(())
}

/// Downloads an image from a public http(s) URL.
///
/// The body is streamed and abandoned as soon as it passes `max_bytes`,
/// whether or not the server sent a Content-Length.
pub async fn fetch_image_from_url(
    client: &reqwest::Client,
    raw_url: &str,
    max_bytes: usize,
    allow_private: bool,
) -> Result<ImageData, AppError> {
    let mut url = Url::parse(raw_url.trim()).map_err(|_| invalid_url())?;
    let load_failed = || AppError::Validation(URL_LOAD_FAILED_MESSAGE.to_string());

    let mut redirects = 0;
    let mut response = loop {
        check_import_target(&url, allow_private).await?;

        let response = client.get(url.clone()).send().await.map_err(|e| {
            warn!("Image URL fetch failed for {url}: {e}");
            load_failed()
        })?;
        if !response.status().is_redirection() {
            break response;
        }

        redirects += 1;
        let next = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| url.join(location).ok());
        match next {
            Some(next) if redirects <= MAX_REDIRECTS => {
                debug!("Image URL {url} redirected to {next}");
                url = next;
            }
            _ => {
                warn!("Image URL {url} has a missing, invalid or excessive redirect");
                return Err(load_failed());
            }
        }
    };

    if !response.status().is_success() {
        warn!("Image URL {url} returned {}", response.status());
        return Err(load_failed());
    }
    if response
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(too_large(max_bytes));
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut buf = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        warn!("Image URL body read failed for {url}: {e}");
        load_failed()
    })? {
        if buf.len() + chunk.len() > max_bytes {
            warn!("Image URL {url} exceeded {max_bytes} bytes, aborting download");
            return Err(too_large(max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }

    validate_upload(buf.freeze(), declared.as_deref(), max_bytes)
}

/// Smart-crop failures on an upload are the user's file, not the server.
pub fn upload_image_error(error: ImageError) -> AppError {
    match error {
        ImageError::Decode(_) | ImageError::Empty => {
            AppError::Validation(INVALID_IMAGE_MESSAGE.to_string())
        }
        other => AppError::Image(other),
    }
}
