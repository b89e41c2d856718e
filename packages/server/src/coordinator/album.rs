use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, instrument};

use crate::entity::{album, song};

use super::{
    detached, ensure_owner, folders, rollback, settle, validate_name, write_error, BlobInput,
    CompensationLog, CoordinatorError, MediaCoordinator, Phase,
};

const DUPLICATE_ALBUM: &str = "Album with the same name and singer has already been created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlbum {
    pub name: String,
}

/// Fields to change. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumChanges {
    pub name: Option<String>,
}

impl MediaCoordinator {
    pub async fn find_album(&self, album_id: i32) -> Result<album::Model, CoordinatorError> {
        album::Entity::find_by_id(album_id)
            .one(&self.db)
            .await
            .map_err(|e| CoordinatorError::record(Phase::Validating, "load album", e))?
            .ok_or_else(|| CoordinatorError::NotFound(format!("Album {album_id} not found")))
    }

    async fn ensure_album_name_free(
        &self,
        owner_id: i32,
        name: &str,
        except: Option<i32>,
    ) -> Result<(), CoordinatorError> {
        let mut query = album::Entity::find()
            .filter(album::Column::SingerId.eq(owner_id))
            .filter(album::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(album::Column::Id.ne(id));
        }
        let taken = query
            .one(&self.db)
            .await
            .map_err(|e| CoordinatorError::record(Phase::Validating, "check album name", e))?;
        if taken.is_some() {
            return Err(CoordinatorError::Conflict(DUPLICATE_ALBUM.into()));
        }
        Ok(())
    }

    /// Create an album and its cover blob as one unit.
    #[instrument(skip(self, request, cover), fields(name = %request.name))]
    pub async fn create_album(
        &self,
        owner_id: i32,
        request: NewAlbum,
        cover: BlobInput,
    ) -> Result<album::Model, CoordinatorError> {
        let this = self.clone();
        detached("create album", async move {
            this.create_album_inner(owner_id, request, cover).await
        })
        .await
    }

    async fn create_album_inner(
        &self,
        owner_id: i32,
        request: NewAlbum,
        cover: BlobInput,
    ) -> Result<album::Model, CoordinatorError> {
        let name = validate_name(&request.name)?;
        self.policy.cover.check("cover", &cover)?;
        self.require_owner(owner_id).await?;
        self.ensure_album_name_free(owner_id, &name, None).await?;

        let mut log = CompensationLog::new();
        let outcome = async {
            let cover_ref = self
                .upload_into(&mut log, owner_id, folders::ALBUM_COVER, &cover)
                .await?;

            debug!(phase = ?Phase::Persisting, "Inserting album");
            let now = Utc::now();
            let model = album::ActiveModel {
                name: Set(name),
                singer_id: Set(owner_id),
                cover: Set(cover_ref.key),
                cover_url: Set(cover_ref.url),
                version: Set(1),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };

            let txn = self.begin().await?;
            let inserted = model
                .insert(&txn)
                .await
                .map_err(|e| write_error(e, DUPLICATE_ALBUM, "insert album"));
            settle(txn, inserted, "album insert").await
        }
        .await;

        match outcome {
            Ok(created) => {
                log.commit();
                info!(phase = ?Phase::Committed, album_id = created.id, "Album created");
                Ok(created)
            }
            Err(e) => Err(self.compensate(log, e).await),
        }
    }

    /// Apply `changes` and optionally swap the cover.
    ///
    /// The row is updated with a version compare-and-swap. A replaced cover is deleted
    /// before that update commits, so a successful update never leaves it behind.
    #[instrument(skip(self, changes, cover))]
    pub async fn update_album(
        &self,
        album_id: i32,
        owner_id: i32,
        changes: AlbumChanges,
        cover: Option<BlobInput>,
    ) -> Result<album::Model, CoordinatorError> {
        let this = self.clone();
        detached("update album", async move {
            this.update_album_inner(album_id, owner_id, changes, cover)
                .await
        })
        .await
    }

    async fn update_album_inner(
        &self,
        album_id: i32,
        owner_id: i32,
        changes: AlbumChanges,
        cover: Option<BlobInput>,
    ) -> Result<album::Model, CoordinatorError> {
        let current = self.find_album(album_id).await?;
        ensure_owner("album", current.singer_id, owner_id)?;

        let name = changes.name.as_deref().map(validate_name).transpose()?;
        if let Some(cover) = &cover {
            self.policy.cover.check("cover", cover)?;
        }
        if let Some(name) = &name {
            self.ensure_album_name_free(owner_id, name, Some(album_id))
                .await?;
        }
        if name.is_none() && cover.is_none() {
            return Ok(current);
        }

        let mut log = CompensationLog::new();
        let outcome = async {
            let cover_ref = match &cover {
                Some(input) => Some(
                    self.upload_into(&mut log, owner_id, folders::ALBUM_COVER, input)
                        .await?,
                ),
                None => None,
            };

            debug!(phase = ?Phase::Persisting, version = current.version, "Updating album");
            let mut update = album::Entity::update_many()
                .col_expr(
                    album::Column::Version,
                    Expr::col(album::Column::Version).add(1),
                )
                .col_expr(album::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(album::Column::Id.eq(album_id))
                .filter(album::Column::Version.eq(current.version));
            if let Some(name) = name {
                update = update.col_expr(album::Column::Name, Expr::value(name));
            }
            if let Some(blob) = &cover_ref {
                update = update
                    .col_expr(album::Column::Cover, Expr::value(blob.key.clone()))
                    .col_expr(album::Column::CoverUrl, Expr::value(blob.url.clone()));
            }

            let txn = self.begin().await?;
            let staged = async {
                let result = update
                    .exec(&txn)
                    .await
                    .map_err(|e| write_error(e, DUPLICATE_ALBUM, "update album"))?;
                if result.rows_affected == 0 {
                    return Err(CoordinatorError::Conflict(format!(
                        "Album {album_id} was modified concurrently, reload and retry"
                    )));
                }
                album::Entity::find_by_id(album_id)
                    .one(&txn)
                    .await
                    .map_err(|e| CoordinatorError::record(Phase::Persisting, "reload album", e))?
                    .ok_or_else(|| CoordinatorError::NotFound(format!("Album {album_id} not found")))
            }
            .await;
            let updated = match staged {
                Ok(updated) => updated,
                Err(e) => {
                    rollback(txn).await;
                    return Err(e);
                }
            };

            let replaced = if updated.cover != current.cover {
                vec![current.cover.clone()]
            } else {
                Vec::new()
            };
            self.remove_blobs_and_commit(txn, "album", album_id, replaced)
                .await?;
            Ok(updated)
        }
        .await;

        match outcome {
            Ok(updated) => {
                log.commit();
                info!(phase = ?Phase::Committed, version = updated.version, "Album updated");
                Ok(updated)
            }
            Err(e) => Err(self.compensate(log, e).await),
        }
    }

    /// Delete an album row and its cover. Songs on the album become singles.
    #[instrument(skip(self))]
    pub async fn delete_album(
        &self,
        album_id: i32,
        owner_id: i32,
    ) -> Result<album::Model, CoordinatorError> {
        let this = self.clone();
        detached("delete album", async move {
            this.delete_album_inner(album_id, owner_id).await
        })
        .await
    }

    async fn delete_album_inner(
        &self,
        album_id: i32,
        owner_id: i32,
    ) -> Result<album::Model, CoordinatorError> {
        let current = self.find_album(album_id).await?;
        ensure_owner("album", current.singer_id, owner_id)?;

        let txn = self.begin().await?;
        let staged = async {
            song::Entity::update_many()
                .col_expr(song::Column::AlbumId, Expr::value(Option::<i32>::None))
                .filter(song::Column::AlbumId.eq(album_id))
                .exec(&txn)
                .await
                .map_err(|e| CoordinatorError::record(Phase::Persisting, "detach album songs", e))?;
            let result = album::Entity::delete_many()
                .filter(album::Column::Id.eq(album_id))
                .filter(album::Column::Version.eq(current.version))
                .exec(&txn)
                .await
                .map_err(|e| CoordinatorError::record(Phase::Persisting, "delete album", e))?;
            if result.rows_affected == 0 {
                return Err(CoordinatorError::Conflict(format!(
                    "Album {album_id} was modified concurrently, reload and retry"
                )));
            }
            Ok(())
        }
        .await;
        if let Err(e) = staged {
            rollback(txn).await;
            return Err(e);
        }

        self.remove_blobs_and_commit(txn, "album", album_id, vec![current.cover.clone()])
            .await?;
        info!(phase = ?Phase::Committed, "Album deleted");
        Ok(current)
    }
}
