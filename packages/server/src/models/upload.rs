//! Header vocabulary of the resumable upload protocol (tus 1.0.0, core +
//! creation + creation-with-upload).

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::AppError;

pub const TUS_VERSION: &str = "1.0.0";
pub const TUS_EXTENSIONS: &str = "creation,creation-with-upload";
pub const OFFSET_CONTENT_TYPE: &str = "application/offset+octet-stream";

pub static TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
pub static TUS_VERSION_HEADER: HeaderName = HeaderName::from_static("tus-version");
pub static TUS_EXTENSION: HeaderName = HeaderName::from_static("tus-extension");
pub static TUS_MAX_SIZE: HeaderName = HeaderName::from_static("tus-max-size");
pub static UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");
pub static UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");

fn parse_u64_header(headers: &HeaderMap, name: &HeaderName) -> Result<Option<u64>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{name} must be a non-negative integer"))),
    }
}

/// `Upload-Length`, required.
pub fn upload_length(headers: &HeaderMap) -> Result<u64, AppError> {
    parse_u64_header(headers, &UPLOAD_LENGTH)?
        .ok_or_else(|| AppError::Validation("Upload-Length header is required".into()))
}

/// `Upload-Offset`, required.
pub fn upload_offset(headers: &HeaderMap) -> Result<u64, AppError> {
    parse_u64_header(headers, &UPLOAD_OFFSET)?
        .ok_or_else(|| AppError::Validation("Upload-Offset header is required".into()))
}

/// Whether the request carries an upload body (`Content-Type: application/offset+octet-stream`).
pub fn has_offset_body(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case(OFFSET_CONTENT_TYPE))
}

pub fn header_value(n: u64) -> HeaderValue {
    HeaderValue::from(n)
}
