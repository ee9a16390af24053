//! sea-orm adapters for both track stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{TrackDescriptor, TrackId};
use sea_orm::prelude::Expr;
use sea_orm::*;

use super::{DescriptorRecord, DescriptorStore, LocatorWrite, OwnershipRecord, OwnershipStore, StoreError};
use crate::document::track_descriptor;
use crate::entity::track;

/// Ids per `IN` query; Postgres caps a statement at 65535 bind parameters.
const GET_MANY_CHUNK: usize = 10_000;

fn map_insert_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Duplicate,
        _ => StoreError::Db(err),
    }
}

impl From<track::Model> for OwnershipRecord {
    fn from(m: track::Model) -> Self {
        Self {
            id: TrackId::from_uuid(m.id),
            owner_id: m.user_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<track_descriptor::Model> for DescriptorRecord {
    fn from(m: track_descriptor::Model) -> Self {
        Self {
            id: TrackId::from_uuid(m.id),
            descriptor: TrackDescriptor {
                title: m.title,
                artist: m.artist,
                album: m.album,
                genre: m.genre,
                duration: m.duration,
                format: m.format,
            },
            locator: m.locator,
            updated_at: m.updated_at,
        }
    }
}

/// Ownership rows in the relational database.
#[derive(Clone)]
pub struct SeaOwnershipStore {
    db: DatabaseConnection,
}

impl SeaOwnershipStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OwnershipStore for SeaOwnershipStore {
    async fn insert(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        track::ActiveModel {
            id: Set(record.id.as_uuid()),
            user_id: Set(record.owner_id),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(map_insert_err)?;
        Ok(())
    }

    async fn get(&self, id: TrackId) -> Result<Option<OwnershipRecord>, StoreError> {
        Ok(track::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await?
            .map(OwnershipRecord::from))
    }

    async fn list(&self) -> Result<Vec<OwnershipRecord>, StoreError> {
        Ok(track::Entity::find()
            .order_by_desc(track::Column::CreatedAt)
            .order_by_desc(track::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(OwnershipRecord::from)
            .collect())
    }

    async fn touch(&self, id: TrackId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let res = track::Entity::update_many()
            .col_expr(track::Column::UpdatedAt, Expr::value(at))
            .filter(track::Column::Id.eq(id.as_uuid()))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn delete(&self, id: TrackId) -> Result<bool, StoreError> {
        let res = track::Entity::delete_by_id(id.as_uuid())
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}

/// Descriptor documents in the document database.
#[derive(Clone)]
pub struct SeaDescriptorStore {
    db: DatabaseConnection,
}

impl SeaDescriptorStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DescriptorStore for SeaDescriptorStore {
    async fn insert(&self, record: &DescriptorRecord) -> Result<(), StoreError> {
        let d = &record.descriptor;
        track_descriptor::ActiveModel {
            id: Set(record.id.as_uuid()),
            title: Set(d.title.clone()),
            artist: Set(d.artist.clone()),
            album: Set(d.album.clone()),
            genre: Set(d.genre.clone()),
            duration: Set(d.duration),
            format: Set(d.format.clone()),
            locator: Set(record.locator.clone()),
            updated_at: Set(record.updated_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(map_insert_err)?;
        Ok(())
    }

    async fn get(&self, id: TrackId) -> Result<Option<DescriptorRecord>, StoreError> {
        Ok(track_descriptor::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await?
            .map(DescriptorRecord::from))
    }

    async fn get_many(&self, ids: &[TrackId]) -> Result<Vec<DescriptorRecord>, StoreError> {
        let mut records = Vec::new();
        for chunk in ids.chunks(GET_MANY_CHUNK) {
            let rows = track_descriptor::Entity::find()
                .filter(track_descriptor::Column::Id.is_in(chunk.iter().map(TrackId::as_uuid)))
                .all(&self.db)
                .await?;
            records.extend(rows.into_iter().map(DescriptorRecord::from));
        }
        Ok(records)
    }

    async fn update(&self, record: &DescriptorRecord) -> Result<bool, StoreError> {
        let d = &record.descriptor;
        let res = track_descriptor::Entity::update_many()
            .col_expr(track_descriptor::Column::Title, Expr::value(d.title.clone()))
            .col_expr(track_descriptor::Column::Artist, Expr::value(d.artist.clone()))
            .col_expr(track_descriptor::Column::Album, Expr::value(d.album.clone()))
            .col_expr(track_descriptor::Column::Genre, Expr::value(d.genre.clone()))
            .col_expr(track_descriptor::Column::Duration, Expr::value(d.duration))
            .col_expr(track_descriptor::Column::Format, Expr::value(d.format.clone()))
            .col_expr(track_descriptor::Column::UpdatedAt, Expr::value(record.updated_at))
            .filter(track_descriptor::Column::Id.eq(record.id.as_uuid()))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn set_locator(
        &self,
        id: TrackId,
        locator: &str,
        at: DateTime<Utc>,
    ) -> Result<LocatorWrite, StoreError> {
        // Conditional update: only an unbound descriptor accepts a locator.
        let res = track_descriptor::Entity::update_many()
            .col_expr(track_descriptor::Column::Locator, Expr::value(locator))
            .col_expr(track_descriptor::Column::UpdatedAt, Expr::value(at))
            .filter(track_descriptor::Column::Id.eq(id.as_uuid()))
            .filter(track_descriptor::Column::Locator.is_null())
            .exec(&self.db)
            .await?;
        if res.rows_affected > 0 {
            return Ok(LocatorWrite::Written);
        }

        let current = track_descriptor::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await?;
        Ok(match current.and_then(|m| m.locator) {
            Some(existing) if existing == locator => LocatorWrite::Unchanged,
            Some(existing) => LocatorWrite::Conflict(existing),
            None => LocatorWrite::Missing,
        })
    }

    async fn delete(&self, id: TrackId) -> Result<bool, StoreError> {
        let res = track_descriptor::Entity::delete_by_id(id.as_uuid())
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}
