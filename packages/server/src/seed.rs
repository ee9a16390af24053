use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::document::track_descriptor;
use crate::entity::track;

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &mut IndexCreateStatement) {
    let sql = stmt.if_not_exists().name(name).to_string(PostgresQueryBuilder);
    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {name} exists"),
        Err(e) => warn!("Failed to create index {name}: {e}"),
    }
}

/// Create secondary indexes on the relational store.
///
/// Schema sync doesn't create composite non-unique indexes, so they are
/// created manually on startup. Failures are logged, not fatal.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Per-owner listings, newest first:
    // SELECT ... FROM track WHERE user_id = ? ORDER BY created_at DESC
    create_index(
        db,
        "idx_track_user_created",
        Index::create()
            .table(track::Entity)
            .col(track::Column::UserId)
            .col(track::Column::CreatedAt),
    )
    .await;

    // Newest-first listing of every track.
    create_index(
        db,
        "idx_track_created",
        Index::create()
            .table(track::Entity)
            .col(track::Column::CreatedAt),
    )
    .await;

    Ok(())
}

/// Create secondary indexes on the document store.
pub async fn ensure_document_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Term filters used by search rebuilds and ad-hoc queries.
    create_index(
        db,
        "idx_track_descriptor_genre_format",
        Index::create()
            .table(track_descriptor::Entity)
            .col(track_descriptor::Column::Genre)
            .col(track_descriptor::Column::Format),
    )
    .await;

    Ok(())
}
