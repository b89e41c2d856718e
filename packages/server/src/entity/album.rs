use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `(name, singer_id)` is unique; see `database::ensure_indexes`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "album")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Owner. Set at creation, never reassigned.
    pub singer_id: i32,
    #[sea_orm(belongs_to, from = "singer_id", to = "id")]
    pub singer: HasOne<super::user::Entity>,

    /// Bucket key of the cover image.
    pub cover: String,
    /// Public locator of the cover image.
    pub cover_url: String,

    /// Bumped by every committed update; updates compare-and-swap on it.
    pub version: i32,

    #[sea_orm(has_many)]
    pub songs: HasMany<super::song::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
