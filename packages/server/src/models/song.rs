use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entity::song;

pub use super::shared::{ListQuery, Pagination, SingerSummary};

#[derive(Serialize, ToSchema)]
pub struct SongResponse {
    pub id: i32,
    pub name: String,
    pub genre: String,
    pub album_id: Option<i32>,
    pub like_count: i32,
    pub cover_url: String,
    pub song_url: String,
    pub version: i32,
    pub singer: Option<SingerSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SongResponse {
    pub fn new(model: song::Model, singer: Option<SingerSummary>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            genre: model.genre,
            album_id: model.album_id,
            like_count: model.like_count,
            cover_url: model.cover_url,
            song_url: model.song_url,
            version: model.version,
            singer,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SongListResponse {
    pub data: Vec<SongResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize, ToSchema)]
pub struct LikeResponse {
    #[schema(example = "Successfully liked song with id 3")]
    pub detail: String,
    pub liked: bool,
    pub like_count: i64,
}
