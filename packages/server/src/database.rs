use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Entity registry prefix for the relational (ownership) store.
pub const RELATIONAL_ENTITIES: &str = "server::entity::*";
/// Entity registry prefix for the document (descriptive) store.
pub const DOCUMENT_ENTITIES: &str = "server::document::*";

/// Connect and sync the schema of every entity registered under `entities`.
pub async fn init_db(db_url: &str, entities: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry(entities).sync(&db).await?;

    Ok(db)
}
