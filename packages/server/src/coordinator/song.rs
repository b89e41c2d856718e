use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, instrument};

use crate::entity::{song, song_like};

use super::{
    detached, ensure_owner, folders, rollback, settle, validate_name, write_error, BlobInput,
    CompensationLog, CoordinatorError, MediaCoordinator, Phase,
};

const DUPLICATE_SONG: &str = "Song with the same name and singer has already been created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    pub name: String,
    pub genre: String,
    /// Album to file the song under. Must belong to the same owner.
    pub album_id: Option<i32>,
}

/// Fields to change. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongChanges {
    pub name: Option<String>,
    pub genre: Option<String>,
}

/// Replacement blobs for an update. Either slot may be left empty.
#[derive(Debug, Clone, Default)]
pub struct SongUploads {
    pub audio: Option<BlobInput>,
    pub cover: Option<BlobInput>,
}

impl SongUploads {
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.cover.is_none()
    }
}

fn validate_genre(genre: &str) -> Result<String, CoordinatorError> {
    let genre = genre.trim();
    if genre.is_empty() || genre.chars().count() > 64 {
        return Err(CoordinatorError::validation(
            "genre",
            "Genre must be 1-64 characters",
        ));
    }
    Ok(genre.to_string())
}

impl MediaCoordinator {
    pub async fn find_song(&self, song_id: i32) -> Result<song::Model, CoordinatorError> {
        song::Entity::find_by_id(song_id)
            .one(&self.db)
            .await
            .map_err(|e| CoordinatorError::record(Phase::Validating, "load song", e))?
            .ok_or_else(|| CoordinatorError::NotFound(format!("Song {song_id} not found")))
    }

    async fn ensure_song_name_free(
        &self,
        owner_id: i32,
        name: &str,
        except: Option<i32>,
    ) -> Result<(), CoordinatorError> {
        let mut query = song::Entity::find()
            .filter(song::Column::SingerId.eq(owner_id))
            .filter(song::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(song::Column::Id.ne(id));
        }
        let taken = query
            .one(&self.db)
            .await
            .map_err(|e| CoordinatorError::record(Phase::Validating, "check song name", e))?;
        if taken.is_some() {
            return Err(CoordinatorError::Conflict(DUPLICATE_SONG.into()));
        }
        Ok(())
    }

    /// Create a song with its audio file and cover image.
    ///
    /// Audio is uploaded first, then the cover; both are compensated if anything after
    /// them fails.
    #[instrument(skip(self, request, audio, cover), fields(name = %request.name))]
    pub async fn create_song(
        &self,
        owner_id: i32,
        request: NewSong,
        audio: BlobInput,
        cover: BlobInput,
    ) -> Result<song::Model, CoordinatorError> {
        let this = self.clone();
        detached("create song", async move {
            this.create_song_inner(owner_id, request, audio, cover)
                .await
        })
        .await
    }

    async fn create_song_inner(
        &self,
        owner_id: i32,
        request: NewSong,
        audio: BlobInput,
        cover: BlobInput,
    ) -> Result<song::Model, CoordinatorError> {
        let name = validate_name(&request.name)?;
        let genre = validate_genre(&request.genre)?;
        self.policy.audio.check("song", &audio)?;
        self.policy.cover.check("cover", &cover)?;
        self.require_owner(owner_id).await?;
        if let Some(album_id) = request.album_id {
            let album = self.find_album(album_id).await?;
            if album.singer_id != owner_id {
                return Err(CoordinatorError::Forbidden(
                    "Cannot add a song to another user's album".into(),
                ));
            }
        }
        self.ensure_song_name_free(owner_id, &name, None).await?;

        let mut log = CompensationLog::new();
        let outcome = async {
            let audio_ref = self
                .upload_into(&mut log, owner_id, folders::SONG_FILE, &audio)
                .await?;
            let cover_ref = self
                .upload_into(&mut log, owner_id, folders::SONG_COVER, &cover)
                .await?;

            debug!(phase = ?Phase::Persisting, "Inserting song");
            let now = Utc::now();
            let model = song::ActiveModel {
                name: Set(name),
                genre: Set(genre),
                singer_id: Set(owner_id),
                album_id: Set(request.album_id),
                like_count: Set(0),
                cover: Set(cover_ref.key),
                cover_url: Set(cover_ref.url),
                song: Set(audio_ref.key),
                song_url: Set(audio_ref.url),
                version: Set(1),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };

            let txn = self.begin().await?;
            let inserted = model
                .insert(&txn)
                .await
                .map_err(|e| write_error(e, DUPLICATE_SONG, "insert song"));
            settle(txn, inserted, "song insert").await
        }
        .await;

        match outcome {
            Ok(created) => {
                log.commit();
                info!(phase = ?Phase::Committed, song_id = created.id, "Song created");
                Ok(created)
            }
            Err(e) => Err(self.compensate(log, e).await),
        }
    }

    /// Apply `changes` and swap any supplied blobs under a version compare-and-swap.
    ///
    /// Replaced blobs are deleted before the update commits.
    #[instrument(skip(self, changes, uploads))]
    pub async fn update_song(
        &self,
        song_id: i32,
        owner_id: i32,
        changes: SongChanges,
        uploads: SongUploads,
    ) -> Result<song::Model, CoordinatorError> {
        let this = self.clone();
        detached("update song", async move {
            this.update_song_inner(song_id, owner_id, changes, uploads)
                .await
        })
        .await
    }

    async fn update_song_inner(
        &self,
        song_id: i32,
        owner_id: i32,
        changes: SongChanges,
        uploads: SongUploads,
    ) -> Result<song::Model, CoordinatorError> {
        let current = self.find_song(song_id).await?;
        ensure_owner("song", current.singer_id, owner_id)?;

        let name = changes.name.as_deref().map(validate_name).transpose()?;
        let genre = changes.genre.as_deref().map(validate_genre).transpose()?;
        if let Some(audio) = &uploads.audio {
            self.policy.audio.check("song", audio)?;
        }
        if let Some(cover) = &uploads.cover {
            self.policy.cover.check("cover", cover)?;
        }
        if let Some(name) = &name {
            self.ensure_song_name_free(owner_id, name, Some(song_id))
                .await?;
        }
        if name.is_none() && genre.is_none() && uploads.is_empty() {
            return Ok(current);
        }

        let mut log = CompensationLog::new();
        let outcome = async {
            let audio_ref = match &uploads.audio {
                Some(input) => Some(
                    self.upload_into(&mut log, owner_id, folders::SONG_FILE, input)
                        .await?,
                ),
                None => None,
            };
            let cover_ref = match &uploads.cover {
                Some(input) => Some(
                    self.upload_into(&mut log, owner_id, folders::SONG_COVER, input)
                        .await?,
                ),
                None => None,
            };

            debug!(phase = ?Phase::Persisting, version = current.version, "Updating song");
            let mut update = song::Entity::update_many()
                .col_expr(song::Column::Version, Expr::col(song::Column::Version).add(1))
                .col_expr(song::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(song::Column::Id.eq(song_id))
                .filter(song::Column::Version.eq(current.version));
            if let Some(name) = name {
                update = update.col_expr(song::Column::Name, Expr::value(name));
            }
            if let Some(genre) = genre {
                update = update.col_expr(song::Column::Genre, Expr::value(genre));
            }
            if let Some(blob) = &audio_ref {
                update = update
                    .col_expr(song::Column::Song, Expr::value(blob.key.clone()))
                    .col_expr(song::Column::SongUrl, Expr::value(blob.url.clone()));
            }
            if let Some(blob) = &cover_ref {
                update = update
                    .col_expr(song::Column::Cover, Expr::value(blob.key.clone()))
                    .col_expr(song::Column::CoverUrl, Expr::value(blob.url.clone()));
            }

            let txn = self.begin().await?;
            let staged = async {
                let result = update
                    .exec(&txn)
                    .await
                    .map_err(|e| write_error(e, DUPLICATE_SONG, "update song"))?;
                if result.rows_affected == 0 {
                    return Err(CoordinatorError::Conflict(format!(
                        "Song {song_id} was modified concurrently, reload and retry"
                    )));
                }
                song::Entity::find_by_id(song_id)
                    .one(&txn)
                    .await
                    .map_err(|e| CoordinatorError::record(Phase::Persisting, "reload song", e))?
                    .ok_or_else(|| CoordinatorError::NotFound(format!("Song {song_id} not found")))
            }
            .await;
            let updated = match staged {
                Ok(updated) => updated,
                Err(e) => {
                    rollback(txn).await;
                    return Err(e);
                }
            };

            let mut replaced = Vec::new();
            if updated.song != current.song {
                replaced.push(current.song.clone());
            }
            if updated.cover != current.cover {
                replaced.push(current.cover.clone());
            }
            self.remove_blobs_and_commit(txn, "song", song_id, replaced)
                .await?;
            Ok(updated)
        }
        .await;

        match outcome {
            Ok(updated) => {
                log.commit();
                info!(phase = ?Phase::Committed, version = updated.version, "Song updated");
                Ok(updated)
            }
            Err(e) => Err(self.compensate(log, e).await),
        }
    }

    /// Delete a song, its likes, its audio file and its cover.
    #[instrument(skip(self))]
    pub async fn delete_song(
        &self,
        song_id: i32,
        owner_id: i32,
    ) -> Result<song::Model, CoordinatorError> {
        let this = self.clone();
        detached("delete song", async move {
            this.delete_song_inner(song_id, owner_id).await
        })
        .await
    }

    async fn delete_song_inner(
        &self,
        song_id: i32,
        owner_id: i32,
    ) -> Result<song::Model, CoordinatorError> {
        let current = self.find_song(song_id).await?;
        ensure_owner("song", current.singer_id, owner_id)?;

        let txn = self.begin().await?;
        let staged = async {
            song_like::Entity::delete_many()
                .filter(song_like::Column::SongId.eq(song_id))
                .exec(&txn)
                .await
                .map_err(|e| CoordinatorError::record(Phase::Persisting, "delete song likes", e))?;
            let result = song::Entity::delete_many()
                .filter(song::Column::Id.eq(song_id))
                .filter(song::Column::Version.eq(current.version))
                .exec(&txn)
                .await
                .map_err(|e| CoordinatorError::record(Phase::Persisting, "delete song", e))?;
            if result.rows_affected == 0 {
                return Err(CoordinatorError::Conflict(format!(
                    "Song {song_id} was modified concurrently, reload and retry"
                )));
            }
            Ok(())
        }
        .await;
        if let Err(e) = staged {
            rollback(txn).await;
            return Err(e);
        }

        self.remove_blobs_and_commit(
            txn,
            "song",
            song_id,
            vec![current.song.clone(), current.cover.clone()],
        )
        .await?;
        info!(phase = ?Phase::Committed, "Song deleted");
        Ok(current)
    }
}
