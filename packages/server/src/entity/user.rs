use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A catalog user. Every album and song is owned by exactly one user (its singer).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    pub fullname: String,
    pub email: String,

    #[sea_orm(has_many)]
    pub albums: HasMany<super::album::Entity>,

    #[sea_orm(has_many)]
    pub songs: HasMany<super::song::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
