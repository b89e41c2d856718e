use std::sync::Arc;

use common::storage::BlobStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::coordinator::{CoordinatorSettings, LikeToggle, MediaCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub media: MediaCoordinator,
    pub likes: LikeToggle,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection, blobs: Arc<dyn BlobStore>) -> Self {
        let settings = CoordinatorSettings {
            blob_timeout: config.storage.operation_timeout(),
            delete_retry: config.storage.compensation_retry,
        };
        let media = MediaCoordinator::new(db.clone(), blobs, config.media.clone(), settings);
        let likes = LikeToggle::new(db.clone(), config.likes.max_attempts);
        Self {
            config: Arc::new(config),
            db,
            media,
            likes,
        }
    }
}
