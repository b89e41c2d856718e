//! Like toggling for songs.
//!
//! The `song_like` edge table is the source of truth; `song.like_count` is a derived
//! counter kept in step by relative updates inside the same transaction as the edge
//! change. Concurrent toggles from one user serialize on the edge's primary key.

use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait, TryInsertResult,
};
use serde::Serialize;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::entity::{song, song_like, user};

use super::{rollback, CoordinatorError, Phase};

/// State after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LikeOutcome {
    /// Whether the user likes the song now.
    pub liked: bool,
    pub like_count: i64,
}

enum Attempt {
    Done(LikeOutcome),
    /// A concurrent toggle inserted the edge first.
    Lost,
}

#[derive(Clone)]
pub struct LikeToggle {
    db: DatabaseConnection,
    max_attempts: u32,
}

fn record(context: &str) -> impl FnOnce(sea_orm::DbErr) -> CoordinatorError + '_ {
    move |e| CoordinatorError::record(Phase::Persisting, context, e)
}

impl LikeToggle {
    pub fn new(db: DatabaseConnection, max_attempts: u32) -> Self {
        Self {
            db,
            max_attempts: Ord::max(max_attempts, 1),
        }
    }

    /// Flip the like state of (`user_id`, `song_id`) and return the new state.
    #[instrument(skip(self))]
    pub async fn toggle(&self, user_id: i32, song_id: i32) -> Result<LikeOutcome, CoordinatorError> {
        for attempt in 1..=self.max_attempts {
            match self.try_toggle(user_id, song_id).await? {
                Attempt::Done(outcome) => {
                    debug!(liked = outcome.liked, like_count = outcome.like_count, "Like toggled");
                    return Ok(outcome);
                }
                Attempt::Lost => {
                    debug!(attempt, "Lost the edge insert to a concurrent toggle, retrying")
                }
            }
        }
        Err(CoordinatorError::Conflict(format!(
            "Like on song {song_id} is contended, try again"
        )))
    }

    async fn try_toggle(&self, user_id: i32, song_id: i32) -> Result<Attempt, CoordinatorError> {
        let txn = self.db.begin().await.map_err(record("begin transaction"))?;
        match Self::toggle_in(&txn, user_id, song_id).await {
            Ok(Attempt::Done(outcome)) => {
                txn.commit().await.map_err(record("commit like toggle"))?;
                Ok(Attempt::Done(outcome))
            }
            Ok(Attempt::Lost) => {
                rollback(txn).await;
                Ok(Attempt::Lost)
            }
            Err(e) => {
                rollback(txn).await;
                Err(e)
            }
        }
    }

    async fn toggle_in(
        txn: &DatabaseTransaction,
        user_id: i32,
        song_id: i32,
    ) -> Result<Attempt, CoordinatorError> {
        if song::Entity::find_by_id(song_id)
            .one(txn)
            .await
            .map_err(record("load song"))?
            .is_none()
        {
            return Err(CoordinatorError::NotFound(format!("Song {song_id} not found")));
        }
        if user::Entity::find_by_id(user_id)
            .one(txn)
            .await
            .map_err(record("load user"))?
            .is_none()
        {
            return Err(CoordinatorError::NotFound(format!("User {user_id} not found")));
        }

        let removed = song_like::Entity::delete_many()
            .filter(song_like::Column::UserId.eq(user_id))
            .filter(song_like::Column::SongId.eq(song_id))
            .exec(txn)
            .await
            .map_err(record("delete like"))?
            .rows_affected;

        let (liked, delta) = if removed > 0 {
            (false, -1i32)
        } else {
            let edge = song_like::ActiveModel {
                user_id: Set(user_id),
                song_id: Set(song_id),
                created_at: Set(Utc::now()),
            };
            let inserted = song_like::Entity::insert(edge)
                .on_conflict_do_nothing()
                .exec_without_returning(txn)
                .await
                .map_err(record("insert like"))?;
            match inserted {
                TryInsertResult::Inserted(rows) if rows > 0 => (true, 1),
                _ => return Ok(Attempt::Lost),
            }
        };

        song::Entity::update_many()
            .col_expr(
                song::Column::LikeCount,
                Expr::col(song::Column::LikeCount).add(delta),
            )
            .filter(song::Column::Id.eq(song_id))
            .exec(txn)
            .await
            .map_err(record("update like count"))?;

        let like_count = song::Entity::find_by_id(song_id)
            .one(txn)
            .await
            .map_err(record("reload like count"))?
            .map(|s| i64::from(s.like_count))
            .ok_or_else(|| CoordinatorError::NotFound(format!("Song {song_id} not found")))?;

        Ok(Attempt::Done(LikeOutcome { liked, like_count }))
    }

    /// Recompute `like_count` from the edge table and return the repaired value.
    #[instrument(skip(self))]
    pub async fn recount(&self, song_id: i32) -> Result<i64, CoordinatorError> {
        let txn = self.db.begin().await.map_err(record("begin transaction"))?;
        let outcome = async {
            let count = song_like::Entity::find()
                .filter(song_like::Column::SongId.eq(song_id))
                .count(&txn)
                .await
                .map_err(record("count likes"))?;
            let stored = i32::try_from(count).map_err(|_| {
                CoordinatorError::validation("like_count", "Like count exceeds the column range")
            })?;
            let result = song::Entity::update_many()
                .col_expr(song::Column::LikeCount, Expr::value(stored))
                .filter(song::Column::Id.eq(song_id))
                .exec(&txn)
                .await
                .map_err(record("store like count"))?;
            if result.rows_affected == 0 {
                return Err(CoordinatorError::NotFound(format!("Song {song_id} not found")));
            }
            Ok(i64::from(stored))
        }
        .await;

        match outcome {
            Ok(count) => {
                txn.commit().await.map_err(record("commit recount"))?;
                info!(like_count = count, "Like count recomputed");
                Ok(count)
            }
            Err(e) => {
                rollback(txn).await;
                Err(e)
            }
        }
    }
}
