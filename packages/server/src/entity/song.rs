use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `(name, singer_id)` is unique; see `database::ensure_indexes`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "song")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub genre: String,

    pub singer_id: i32,
    #[sea_orm(belongs_to, from = "singer_id", to = "id")]
    pub singer: HasOne<super::user::Entity>,

    /// NULL for singles, or once the album has been deleted.
    pub album_id: Option<i32>,
    #[sea_orm(belongs_to, from = "album_id", to = "id")]
    pub album: HasOne<super::album::Entity>,

    /// Denormalized count of `song_like` rows. Only ever changed by relative updates.
    pub like_count: i32,

    /// Bucket key and public locator of the cover image.
    pub cover: String,
    pub cover_url: String,

    /// Bucket key and public locator of the audio file.
    pub song: String,
    pub song_url: String,

    pub version: i32,

    #[sea_orm(has_many)]
    pub likes: HasMany<super::song_like::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
