use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entity::album;

pub use super::shared::{ListQuery, Pagination, SingerSummary};

#[derive(Serialize, ToSchema)]
pub struct AlbumResponse {
    pub id: i32,
    pub name: String,
    pub cover_url: String,
    /// Incremented by every update.
    pub version: i32,
    pub singer: Option<SingerSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlbumResponse {
    pub fn new(model: album::Model, singer: Option<SingerSummary>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            cover_url: model.cover_url,
            version: model.version,
            singer,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AlbumListResponse {
    pub data: Vec<AlbumResponse>,
    pub pagination: Pagination,
}
