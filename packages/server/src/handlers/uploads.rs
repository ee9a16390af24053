use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::upload::{UploadError, UploadId, UploadInfo};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{instrument, warn};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::upload::*;
use crate::state::AppState;

fn parse_upload_id(raw: &str) -> Result<UploadId, AppError> {
    Ok(UploadId::from_hex(raw)?)
}

/// Headers every tus response carries.
fn tus_headers(info: &UploadInfo) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TUS_RESUMABLE.clone(), HeaderValue::from_static(TUS_VERSION));
    headers.insert(UPLOAD_OFFSET.clone(), header_value(info.offset));
    headers
}

/// Feed a request body into the engine at `offset`.
async fn write_body(
    state: &AppState,
    id: &UploadId,
    offset: u64,
    body: Body,
) -> Result<UploadInfo, UploadError> {
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let mut reader = StreamReader::new(stream);
    state.uploads.write(id, offset, &mut reader).await
}

#[utoipa::path(
    options,
    path = "/upload",
    tag = "Uploads",
    operation_id = "uploadOptions",
    summary = "Discover resumable upload capabilities",
    responses(
        (status = 204, description = "Supported tus version, extensions and max size"),
    ),
)]
pub async fn upload_options(State(state): State<AppState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(TUS_RESUMABLE.clone(), HeaderValue::from_static(TUS_VERSION));
    headers.insert(TUS_VERSION_HEADER.clone(), HeaderValue::from_static(TUS_VERSION));
    headers.insert(TUS_EXTENSION.clone(), HeaderValue::from_static(TUS_EXTENSIONS));
    headers.insert(TUS_MAX_SIZE.clone(), header_value(state.config.upload.max_size));
    (StatusCode::NO_CONTENT, headers)
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Uploads",
    operation_id = "createUpload",
    summary = "Create a resumable upload",
    description = "Creates an upload of `Upload-Length` bytes. With \
        `Content-Type: application/offset+octet-stream` the body is written immediately \
        (creation-with-upload); an interrupted body keeps the bytes received.",
    params(
        ("Upload-Length" = u64, Header, description = "Total byte length"),
    ),
    responses(
        (status = 201, description = "Upload created; `Location` and `Upload-Offset` headers set"),
        (status = 400, description = "Missing or oversized length (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers, body), fields(user_id = auth_user.user_id, upload_id))]
pub async fn create_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let length = upload_length(&headers)?;
    let mut info = state.uploads.create(length).await?;
    tracing::Span::current().record("upload_id", tracing::field::display(info.id));

    if has_offset_body(&headers) {
        info = match write_body(&state, &info.id, 0, body).await {
            Ok(info) => info,
            Err(UploadError::Io(e)) => {
                warn!(error = %e, "Creation body interrupted, keeping received bytes");
                state.uploads.info(&info.id).await?
            }
            Err(e) => return Err(e.into()),
        };
    }

    let mut response_headers = tus_headers(&info);
    let location = HeaderValue::from_str(&info.location())
        .map_err(|e| AppError::Internal(format!("Invalid upload location: {e}")))?;
    response_headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, response_headers).into_response())
}

#[utoipa::path(
    head,
    path = "/upload/{id}",
    tag = "Uploads",
    operation_id = "getUploadOffset",
    summary = "Query the offset of an upload",
    params(("id" = String, Path, description = "Upload ID (32 hex characters)")),
    responses(
        (status = 200, description = "`Upload-Offset` and `Upload-Length` headers set"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)"),
        (status = 404, description = "Upload not found"),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn upload_offset_query(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let info = state.uploads.info(&parse_upload_id(&id)?).await?;

    let mut headers = tus_headers(&info);
    headers.insert(UPLOAD_LENGTH.clone(), header_value(info.length));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok((StatusCode::OK, headers).into_response())
}

#[utoipa::path(
    patch,
    path = "/upload/{id}",
    tag = "Uploads",
    operation_id = "appendUpload",
    summary = "Append bytes to an upload",
    description = "Requires `Content-Type: application/offset+octet-stream` and an \
        `Upload-Offset` equal to the current offset. Bytes past the declared length \
        reject the whole request.",
    params(
        ("id" = String, Path, description = "Upload ID (32 hex characters)"),
        ("Upload-Offset" = u64, Header, description = "Offset this chunk starts at"),
    ),
    request_body(content_type = "application/offset+octet-stream", description = "Raw bytes"),
    responses(
        (status = 204, description = "Bytes appended; new `Upload-Offset` header set"),
        (status = 400, description = "Missing headers or length exceeded (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Upload not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Offset mismatch (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, headers, body))]
pub async fn append_upload(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let id = parse_upload_id(&id)?;
    if !has_offset_body(&headers) {
        return Err(AppError::Validation(format!(
            "Content-Type must be {OFFSET_CONTENT_TYPE}"
        )));
    }
    let offset = upload_offset(&headers)?;

    let info = write_body(&state, &id, offset, body).await?;
    Ok((StatusCode::NO_CONTENT, tus_headers(&info)).into_response())
}

#[utoipa::path(
    get,
    path = "/upload/{id}",
    tag = "Uploads",
    operation_id = "downloadUpload",
    summary = "Download a completed upload",
    params(("id" = String, Path, description = "Upload ID (32 hex characters)")),
    responses(
        (status = 200, description = "Object bytes", content_type = "application/octet-stream"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Upload not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Upload incomplete (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn download_upload(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let (info, reader) = state.uploads.open(&parse_upload_id(&id)?).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, info.length.to_string());
    if let Some(checksum) = &info.checksum {
        builder = builder.header(header::ETAG, format!("\"{checksum}\""));
    }

    builder
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
