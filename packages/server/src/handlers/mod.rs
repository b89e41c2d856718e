pub mod album;
pub mod song;

use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entity::user;
use crate::error::AppError;
use crate::models::shared::SingerSummary;

async fn singer_summary(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<SingerSummary>, AppError> {
    Ok(user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .map(SingerSummary::from))
}
