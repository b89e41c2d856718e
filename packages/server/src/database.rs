use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::{album, song, song_like, user};

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .sqlx_logging(config.sqlx_logging);
    if let Some(secs) = config.idle_timeout_secs {
        opt.idle_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.max_lifetime_secs {
        opt.max_lifetime(Duration::from_secs(secs));
    }

    let db = Database::connect(opt).await?;
    create_tables(&db).await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

/// Create missing tables, parents before children so foreign keys resolve.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, album::Entity).await?;
    create_table(db, song::Entity).await?;
    create_table(db, song_like::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute_raw(backend.build(&stmt)).await?;
    Ok(())
}

/// Ensure the composite unique indexes exist.
///
/// These, not the coordinator's pre-checks, enforce per-owner name uniqueness.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    let album_idx = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_album_singer_name")
        .table(album::Entity)
        .col(album::Column::SingerId)
        .col(album::Column::Name)
        .to_owned();
    db.execute_raw(backend.build(&album_idx)).await?;
    info!("Ensured index idx_album_singer_name exists");

    let song_idx = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_song_singer_name")
        .table(song::Entity)
        .col(song::Column::SingerId)
        .col(song::Column::Name)
        .to_owned();
    db.execute_raw(backend.build(&song_idx)).await?;
    info!("Ensured index idx_song_singer_name exists");

    // Lookup index for recounting likes per song; failure only costs speed.
    let like_idx = Index::create()
        .if_not_exists()
        .name("idx_song_like_song")
        .table(song_like::Entity)
        .col(song_like::Column::SongId)
        .to_owned();
    if let Err(e) = db.execute_raw(backend.build(&like_idx)).await {
        warn!("Failed to create index idx_song_like_song: {}", e);
    }

    Ok(())
}
