use chrono::{DateTime, Utc};
use common::{TrackDescriptor, TrackId};
use serde::{Deserialize, Serialize};

use crate::coordinator::{UploadReport, UploadState};
use crate::error::AppError;
use crate::models::shared::{
    double_option, normalize_optional, validate_duration, validate_optional_text, validate_text,
};
use crate::tracks::{DescriptorPatch, Track};

const MAX_TEXT: usize = 256;
const MAX_FORMAT: usize = 16;

/// Query parameters of `POST /tracks/upload`.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadTrackQuery {
    /// Declared byte length; alternative to the `Upload-Length` header.
    pub upload_length: Option<u64>,
}

/// Descriptive metadata sent as the `metadata` part of an upload.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTrackRequest {
    #[schema(example = "Moonlight Drive")]
    pub title: String,
    #[schema(example = "The Doors")]
    pub artist: String,
    #[schema(example = "Strange Days")]
    pub album: Option<String>,
    #[schema(example = "rock")]
    pub genre: Option<String>,
    /// Length in seconds.
    #[schema(example = 163)]
    pub duration: Option<i32>,
    /// Container format, e.g. `mp3`, `flac`.
    #[schema(example = "mp3")]
    pub format: String,
}

impl CreateTrackRequest {
    /// Validate and normalize into a descriptor.
    pub fn into_descriptor(self) -> Result<TrackDescriptor, AppError> {
        validate_text(&self.title, "Title", MAX_TEXT)?;
        validate_text(&self.artist, "Artist", MAX_TEXT)?;
        validate_text(&self.format, "Format", MAX_FORMAT)?;
        validate_duration(self.duration)?;
        // Blank optional fields are treated as absent.
        let album = normalize_optional(self.album);
        let genre = normalize_optional(self.genre);
        validate_optional_text(album.as_deref(), "Album", MAX_TEXT)?;
        validate_optional_text(genre.as_deref(), "Genre", MAX_TEXT)?;

        Ok(TrackDescriptor {
            title: self.title.trim().to_string(),
            artist: self.artist.trim().to_string(),
            album,
            genre,
            duration: self.duration,
            format: self.format.trim().to_lowercase(),
        })
    }
}

/// Partial update. Omitted fields are unchanged; `null` clears a nullable field.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateTrackRequest {
    pub title: Option<String>,
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub album: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub duration: Option<Option<i32>>,
    pub format: Option<String>,
}

impl UpdateTrackRequest {
    pub fn into_patch(self) -> Result<DescriptorPatch, AppError> {
        if let Some(ref t) = self.title {
            validate_text(t, "Title", MAX_TEXT)?;
        }
        if let Some(ref a) = self.artist {
            validate_text(a, "Artist", MAX_TEXT)?;
        }
        let album = self.album.map(normalize_optional);
        let genre = self.genre.map(normalize_optional);
        validate_optional_text(album.as_ref().and_then(|a| a.as_deref()), "Album", MAX_TEXT)?;
        validate_optional_text(genre.as_ref().and_then(|g| g.as_deref()), "Genre", MAX_TEXT)?;
        if let Some(ref f) = self.format {
            validate_text(f, "Format", MAX_FORMAT)?;
        }
        if let Some(d) = self.duration {
            validate_duration(d)?;
        }

        Ok(DescriptorPatch {
            title: self.title.map(|t| t.trim().to_string()),
            artist: self.artist.map(|a| a.trim().to_string()),
            album,
            genre,
            duration: self.duration,
            format: self.format.map(|f| f.trim().to_lowercase()),
        })
    }
}

/// Body of a locator re-bind.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LocatorRequest {
    /// Opaque upload identifier (32 hex characters).
    #[schema(example = "0f8fad5bd9cb469fa16570867728950e")]
    pub locator: String,
}

/// A track with both parts joined.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TrackResponse {
    pub id: TrackId,
    #[schema(example = 42)]
    pub owner_id: i32,
    #[schema(example = "Moonlight Drive")]
    pub title: String,
    #[schema(example = "The Doors")]
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration: Option<i32>,
    #[schema(example = "mp3")]
    pub format: String,
    /// Absent until the upload is bound.
    pub locator: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Track> for TrackResponse {
    fn from(t: Track) -> Self {
        Self {
            id: t.id,
            owner_id: t.owner_id,
            title: t.descriptor.title,
            artist: t.descriptor.artist,
            album: t.descriptor.album,
            genre: t.descriptor.genre,
            duration: t.descriptor.duration,
            format: t.descriptor.format,
            locator: t.locator,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TrackListResponse {
    pub tracks: Vec<TrackResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PlayResponse {
    /// Path from which the stored object is served.
    #[schema(example = "/upload/0f8fad5bd9cb469fa16570867728950e")]
    pub track_url: String,
}

/// Result of a coordinated upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadTrackResponse {
    pub track_id: TrackId,
    pub state: UploadState,
    #[schema(example = "0f8fad5bd9cb469fa16570867728950e")]
    pub locator: String,
    /// Resumable upload URL for the remaining bytes.
    #[schema(example = "/upload/0f8fad5bd9cb469fa16570867728950e")]
    pub location: String,
    #[schema(example = 1024)]
    pub offset: u64,
    #[schema(example = 1024)]
    pub length: u64,
}

impl From<UploadReport> for UploadTrackResponse {
    fn from(r: UploadReport) -> Self {
        Self {
            track_id: r.track_id,
            state: r.state,
            location: r.upload.location(),
            locator: r.locator,
            offset: r.upload.offset,
            length: r.upload.length,
        }
    }
}
