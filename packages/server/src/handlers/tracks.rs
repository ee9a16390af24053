use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::TrackId;
use common::upload::{UPLOAD_PATH, UploadId};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::instrument;

use crate::coordinator::UploadState;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::extractors::multipart::AppMultipart;
use crate::extractors::query::AppQuery;
use crate::models::track::*;
use crate::models::upload::upload_length;
use crate::state::AppState;
use crate::tracks::Track;

/// Multipart overhead allowed on top of the configured upload size.
const MULTIPART_SLACK: usize = 1024 * 1024;

pub fn upload_body_limit(max_size: u64) -> DefaultBodyLimit {
    let max = usize::try_from(max_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_SLACK))
}

fn parse_track_id(raw: &str) -> Result<TrackId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid track ID '{raw}'")))
}

/// Load a track and check that `auth_user` owns it.
async fn owned_track(state: &AppState, auth_user: &AuthUser, id: TrackId) -> Result<Track, AppError> {
    let track = state.tracks.get(id).await?;
    auth_user.require_owner(track.owner_id)?;
    Ok(track)
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Tracks",
    operation_id = "uploadTrack",
    summary = "Upload a track with its metadata",
    description = "Multipart body: a `metadata` JSON part followed by a `file` part. \
        The declared byte length comes from the `upload_length` query parameter or the \
        `Upload-Length` header. The transfer and the metadata write run concurrently; \
        if either fails both are rolled back. A body shorter than the declared length \
        is accepted and can be resumed at the returned location.",
    params(UploadTrackQuery),
    request_body(content_type = "multipart/form-data", description = "`metadata` (JSON) then `file` (binary)"),
    responses(
        (status = 201, description = "Upload bound to a new track", body = UploadTrackResponse),
        (status = 202, description = "Upload stored but locator binding failed (orphaned)", body = UploadTrackResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 502, description = "Store or upload engine failure (UPSTREAM_FAILURE)", body = ErrorBody),
        (status = 504, description = "Upload deadline exceeded (UPSTREAM_TIMEOUT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query, headers, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_track(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UploadTrackQuery>,
    headers: HeaderMap,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<Response, AppError> {
    let length = match query.upload_length {
        Some(length) => length,
        None => upload_length(&headers)?,
    };

    let metadata = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        .ok_or_else(|| AppError::Validation("Missing 'metadata' field".into()))?;
    if metadata.name() != Some("metadata") {
        return Err(AppError::Validation(
            "The 'metadata' field must come before 'file'".into(),
        ));
    }
    let raw = metadata
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read metadata: {e}")))?;
    let descriptor = serde_json::from_slice::<CreateTrackRequest>(&raw)
        .map_err(|e| AppError::Validation(format!("Invalid metadata: {e}")))?
        .into_descriptor()?;

    let file = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        .ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    if file.name() != Some("file") {
        return Err(AppError::Validation("Expected a 'file' field".into()));
    }

    let mut body = StreamReader::new(Box::pin(file.map_err(std::io::Error::other)));
    let report = state
        .coordinator
        .upload(auth_user.user_id, length, descriptor, &mut body)
        .await?;

    let status = match report.state {
        UploadState::Orphaned => StatusCode::ACCEPTED,
        _ => StatusCode::CREATED,
    };
    let location = report.upload.location();
    Ok((
        status,
        [(header::LOCATION, location)],
        Json(UploadTrackResponse::from(report)),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Tracks",
    operation_id = "listTracks",
    summary = "List all tracks",
    description = "Every complete track, newest first. Not paginated.",
    responses(
        (status = 200, description = "Track list", body = TrackListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_tracks(
    _auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TrackListResponse>, AppError> {
    let tracks = state.tracks.list().await?;
    Ok(Json(TrackListResponse {
        tracks: tracks.into_iter().map(TrackResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Tracks",
    operation_id = "getTrack",
    summary = "Get a track",
    params(("id" = String, Path, description = "Track ID (UUID)")),
    responses(
        (status = 200, description = "Track", body = TrackResponse),
        (status = 400, description = "Malformed ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Track not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_track(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrackResponse>, AppError> {
    let track = state.tracks.get(parse_track_id(&id)?).await?;
    Ok(Json(TrackResponse::from(track)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Tracks",
    operation_id = "updateTrack",
    summary = "Update track metadata",
    description = "Merges the provided fields. Only the owner may update a track.",
    params(("id" = String, Path, description = "Track ID (UUID)")),
    request_body = UpdateTrackRequest,
    responses(
        (status = 200, description = "Updated track", body = TrackResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Track not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn update_track(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateTrackRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let id = parse_track_id(&id)?;
    let patch = payload.into_patch()?;
    owned_track(&state, &auth_user, id).await?;

    let track = state.tracks.update_descriptor(id, patch).await?;
    Ok(Json(TrackResponse::from(track)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Tracks",
    operation_id = "deleteTrack",
    summary = "Delete a track",
    description = "Removes both parts of the track and its search document. Only the owner may delete a track.",
    params(("id" = String, Path, description = "Track ID (UUID)")),
    responses(
        (status = 204, description = "Track deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Track not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Partial delete (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_track(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_track_id(&id)?;
    // Authorize on the ownership part alone so partial records stay removable.
    auth_user.require_owner(state.tracks.owner_of(id).await?)?;

    state.tracks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/{id}/locator",
    tag = "Tracks",
    operation_id = "bindTrackLocator",
    summary = "Bind an upload to a track",
    description = "Retries the locator binding of an orphaned track. Binding the same locator \
        again is a no-op; binding a different one is a conflict. Only the owner may bind.",
    params(("id" = String, Path, description = "Track ID (UUID)")),
    request_body = LocatorRequest,
    responses(
        (status = 200, description = "Track with locator", body = TrackResponse),
        (status = 400, description = "Malformed locator (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Track or upload not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "A different locator is bound (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, locator = %payload.locator))]
pub async fn bind_locator(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<LocatorRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let id = parse_track_id(&id)?;
    let upload_id = UploadId::from_hex(payload.locator.trim())
        .map_err(|e| AppError::Validation(e.to_string()))?;
    owned_track(&state, &auth_user, id).await?;

    // The upload must exist; it may still be receiving bytes.
    state.uploads.info(&upload_id).await?;

    let track = state
        .tracks
        .attach_physical_locator(id, &upload_id.to_hex())
        .await?;
    Ok(Json(TrackResponse::from(track)))
}

#[utoipa::path(
    get,
    path = "/{id}/play",
    tag = "Tracks",
    operation_id = "playTrack",
    summary = "Get the URL of a track's audio",
    params(("id" = String, Path, description = "Track ID (UUID)")),
    responses(
        (status = 200, description = "Playback URL", body = PlayResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Track not found or not bound yet (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn play_track(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayResponse>, AppError> {
    let track = state.tracks.get(parse_track_id(&id)?).await?;
    let locator = track
        .locator
        .ok_or_else(|| AppError::NotFound(format!("Track {} has no uploaded audio", track.id)))?;
    Ok(Json(PlayResponse {
        track_url: format!("{UPLOAD_PATH}/{locator}"),
    }))
}
