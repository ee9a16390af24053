use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier shared by both parts of a track (ownership and descriptive).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, format = Uuid, example = "01936f0e-1234-7abc-8000-000000000001")]
pub struct TrackId(Uuid);

impl TrackId {
    /// Allocate a fresh, time-ordered identifier (UUIDv7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackId({})", self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for TrackId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Descriptive metadata of a track, as supplied by the uploader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TrackDescriptor {
    #[schema(example = "Moonlight Drive")]
    pub title: String,
    #[schema(example = "The Doors")]
    pub artist: String,
    #[schema(example = "Strange Days")]
    pub album: Option<String>,
    #[schema(example = "rock")]
    pub genre: Option<String>,
    /// Duration in seconds.
    #[schema(example = 163)]
    pub duration: Option<i32>,
    #[schema(example = "mp3")]
    pub format: String,
}

/// Denormalized search projection of a track's descriptive part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TrackDocument {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub format: String,
    pub duration: Option<i32>,
    /// Physical locator of the stored object, absent until the upload is bound.
    pub locator: Option<String>,
}

impl TrackDocument {
    pub fn project(id: TrackId, descriptor: &TrackDescriptor, locator: Option<String>) -> Self {
        Self {
            id,
            title: descriptor.title.clone(),
            artist: descriptor.artist.clone(),
            album: descriptor.album.clone(),
            genre: descriptor.genre.clone(),
            format: descriptor.format.clone(),
            duration: descriptor.duration,
            locator,
        }
    }
}
