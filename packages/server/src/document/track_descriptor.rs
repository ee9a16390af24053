use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "track_descriptor")]
pub struct Model {
    /// Same value as the ownership row's id. No foreign key: the two parts may
    /// live in different databases.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    /// Seconds.
    pub duration: Option<i32>,
    pub format: String,

    /// Upload locator, NULL until the binary transfer is bound.
    pub locator: Option<String>,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
