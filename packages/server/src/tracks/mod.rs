//! Dual-store track metadata.
//!
//! A track is one logical record split in two parts that share a [`TrackId`]:
//! the ownership part (owner, timestamps) in the relational store and the
//! descriptive part (title, artist, locator, ...) in the document store.
//! There is no transaction spanning both stores, so [`TrackRepository`]
//! orders its writes and treats any record missing either part as absent.

#[cfg(test)]
pub mod memory;
pub mod sea;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{TrackDescriptor, TrackDocument, TrackId};
use sea_orm::DbErr;
use tracing::{debug, instrument, warn};

use crate::indexer::Indexer;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("track {0} not found")]
    NotFound(TrackId),
    #[error("{0}")]
    Conflict(String),
    #[error("track store failure: {0}")]
    Store(#[from] StoreError),
    /// The descriptive part is gone but the ownership part could not be removed.
    #[error("track {track_id} partially deleted: {source}")]
    PartialDelete {
        track_id: TrackId,
        source: StoreError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRecord {
    pub id: TrackId,
    pub owner_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorRecord {
    pub id: TrackId,
    pub descriptor: TrackDescriptor,
    pub locator: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a conditional locator write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorWrite {
    Written,
    /// The same locator was already bound.
    Unchanged,
    /// A different locator is already bound.
    Conflict(String),
    Missing,
}

#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] if the id is taken.
    async fn insert(&self, record: &OwnershipRecord) -> Result<(), StoreError>;
    async fn get(&self, id: TrackId) -> Result<Option<OwnershipRecord>, StoreError>;
    /// All rows, newest first.
    async fn list(&self) -> Result<Vec<OwnershipRecord>, StoreError>;
    async fn touch(&self, id: TrackId, at: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn delete(&self, id: TrackId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn insert(&self, record: &DescriptorRecord) -> Result<(), StoreError>;
    async fn get(&self, id: TrackId) -> Result<Option<DescriptorRecord>, StoreError>;
    async fn get_many(&self, ids: &[TrackId]) -> Result<Vec<DescriptorRecord>, StoreError>;
    /// Replace the descriptive fields, leaving the locator untouched.
    async fn update(&self, record: &DescriptorRecord) -> Result<bool, StoreError>;
    /// Bind `locator` only if no locator is bound yet.
    async fn set_locator(
        &self,
        id: TrackId,
        locator: &str,
        at: DateTime<Utc>,
    ) -> Result<LocatorWrite, StoreError>;
    async fn delete(&self, id: TrackId) -> Result<bool, StoreError>;
}

/// A track with both parts joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub owner_id: i32,
    pub descriptor: TrackDescriptor,
    pub locator: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Track {
    fn join(own: OwnershipRecord, desc: DescriptorRecord) -> Self {
        Self {
            id: own.id,
            owner_id: own.owner_id,
            descriptor: desc.descriptor,
            locator: desc.locator,
            created_at: own.created_at,
            updated_at: own.updated_at.max(desc.updated_at),
        }
    }

    pub fn document(&self) -> TrackDocument {
        TrackDocument::project(self.id, &self.descriptor, self.locator.clone())
    }
}

/// Partial descriptor update. `None` leaves a field as is; for nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct DescriptorPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<Option<String>>,
    pub genre: Option<Option<String>>,
    pub duration: Option<Option<i32>>,
    pub format: Option<String>,
}

impl DescriptorPatch {
    fn apply(self, d: &mut TrackDescriptor) {
        if let Some(v) = self.title {
            d.title = v;
        }
        if let Some(v) = self.artist {
            d.artist = v;
        }
        if let Some(v) = self.album {
            d.album = v;
        }
        if let Some(v) = self.genre {
            d.genre = v;
        }
        if let Some(v) = self.duration {
            d.duration = v;
        }
        if let Some(v) = self.format {
            d.format = v;
        }
    }
}

#[derive(Clone)]
pub struct TrackRepository {
    ownership: Arc<dyn OwnershipStore>,
    descriptors: Arc<dyn DescriptorStore>,
    indexer: Indexer,
}

impl TrackRepository {
    pub fn new(
        ownership: Arc<dyn OwnershipStore>,
        descriptors: Arc<dyn DescriptorStore>,
        indexer: Indexer,
    ) -> Self {
        Self {
            ownership,
            descriptors,
            indexer,
        }
    }

    pub async fn begin_track(
        &self,
        owner_id: i32,
        descriptor: TrackDescriptor,
    ) -> Result<TrackId, RepositoryError> {
        let id = TrackId::generate();
        self.begin_track_as(id, owner_id, descriptor).await?;
        Ok(id)
    }

    /// Write both parts under a caller-allocated id, ownership first.
    ///
    /// If the descriptive write fails the ownership row stays behind; the
    /// caller owns compensation.
    #[instrument(skip(self, descriptor), fields(track_id = %id))]
    pub async fn begin_track_as(
        &self,
        id: TrackId,
        owner_id: i32,
        descriptor: TrackDescriptor,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        self.ownership
            .insert(&OwnershipRecord {
                id,
                owner_id,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => RepositoryError::Conflict(format!("Track {id} already exists")),
                other => RepositoryError::Store(other),
            })?;

        let record = DescriptorRecord {
            id,
            descriptor,
            locator: None,
            updated_at: now,
        };
        self.descriptors.insert(&record).await?;

        self.indexer
            .index_track(TrackDocument::project(id, &record.descriptor, None));
        debug!("Track metadata pending");
        Ok(())
    }

    /// Idempotent for the same locator; a different locator is a conflict.
    ///
    /// Success reflects the locator write alone. A failed index refresh
    /// afterwards is logged and leaves the binding in place.
    #[instrument(skip(self))]
    pub async fn bind_locator(&self, id: TrackId, locator: &str) -> Result<(), RepositoryError> {
        match self.descriptors.set_locator(id, locator, Utc::now()).await? {
            LocatorWrite::Written => {
                match self.get(id).await {
                    Ok(track) => self.indexer.index_track(track.document()),
                    Err(e) => warn!(error = %e, "Locator bound but index refresh failed"),
                }
                Ok(())
            }
            LocatorWrite::Unchanged => Ok(()),
            LocatorWrite::Conflict(existing) => Err(RepositoryError::Conflict(format!(
                "Track {id} is already bound to locator {existing}"
            ))),
            LocatorWrite::Missing => Err(RepositoryError::NotFound(id)),
        }
    }

    /// [`Self::bind_locator`], then read the bound track back.
    pub async fn attach_physical_locator(
        &self,
        id: TrackId,
        locator: &str,
    ) -> Result<Track, RepositoryError> {
        self.bind_locator(id, locator).await?;
        self.get(id).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_descriptor(
        &self,
        id: TrackId,
        patch: DescriptorPatch,
    ) -> Result<Track, RepositoryError> {
        let current = self.get(id).await?;

        let mut descriptor = current.descriptor;
        patch.apply(&mut descriptor);
        let now = Utc::now();

        let updated = self
            .descriptors
            .update(&DescriptorRecord {
                id,
                descriptor,
                locator: current.locator,
                updated_at: now,
            })
            .await?;
        if !updated {
            return Err(RepositoryError::NotFound(id));
        }
        if !self.ownership.touch(id, now).await? {
            return Err(RepositoryError::NotFound(id));
        }

        let track = self.get(id).await?;
        self.indexer.index_track(track.document());
        Ok(track)
    }

    /// Remove the descriptive part, then the ownership part.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: TrackId) -> Result<(), RepositoryError> {
        let descriptive_removed = self.descriptors.delete(id).await?;

        let ownership_removed = match self.ownership.delete(id).await {
            Ok(removed) => removed,
            Err(source) if descriptive_removed => {
                self.indexer.remove_track(id);
                warn!(error = %source, "Track partially deleted");
                return Err(RepositoryError::PartialDelete {
                    track_id: id,
                    source,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !descriptive_removed && !ownership_removed {
            return Err(RepositoryError::NotFound(id));
        }
        self.indexer.remove_track(id);
        debug!(descriptive_removed, ownership_removed, "Track deleted");
        Ok(())
    }

    /// Owner of the ownership part, whether or not the descriptive part
    /// exists. Lets partial records be authorized for deletion.
    pub async fn owner_of(&self, id: TrackId) -> Result<i32, RepositoryError> {
        self.ownership
            .get(id)
            .await?
            .map(|own| own.owner_id)
            .ok_or(RepositoryError::NotFound(id))
    }

    pub async fn get(&self, id: TrackId) -> Result<Track, RepositoryError> {
        let (own, desc) = tokio::try_join!(self.ownership.get(id), self.descriptors.get(id))?;
        match (own, desc) {
            (Some(own), Some(desc)) => Ok(Track::join(own, desc)),
            _ => Err(RepositoryError::NotFound(id)),
        }
    }

    /// Every complete track, newest first. Partial records are skipped.
    pub async fn list(&self) -> Result<Vec<Track>, RepositoryError> {
        let owners = self.ownership.list().await?;
        let ids: Vec<TrackId> = owners.iter().map(|o| o.id).collect();
        let mut descriptors: std::collections::HashMap<TrackId, DescriptorRecord> = self
            .descriptors
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        Ok(owners
            .into_iter()
            .filter_map(|own| {
                let desc = descriptors.remove(&own.id)?;
                Some(Track::join(own, desc))
            })
            .collect())
    }
}
