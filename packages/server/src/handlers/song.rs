use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::coordinator::{NewSong, SongChanges, SongUploads};
use crate::entity::song;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::multipart::MediaForm;
use crate::models::song::*;
use crate::state::AppState;

use super::singer_summary;

#[utoipa::path(
    get,
    path = "/",
    tag = "Songs",
    operation_id = "listSongs",
    summary = "List a user's songs",
    description = "Returns one page of the songs owned by `user_id`, newest first. `per_page` (alias `itemPerPage`) is clamped to 10-30.",
    params(ListQuery),
    responses(
        (status = 200, description = "Songs", body = SongListResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn list_songs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<SongListResponse>, AppError> {
    let (page, per_page) = query.window();
    let select = song::Entity::find().filter(song::Column::SingerId.eq(query.user_id));

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let songs = select
        .order_by_desc(song::Column::CreatedAt)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let singer = singer_summary(&state.db, query.user_id).await?;
    let data = songs
        .into_iter()
        .map(|m| SongResponse::new(m, singer.clone()))
        .collect();

    Ok(Json(SongListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Songs",
    operation_id = "getSong",
    summary = "Get a song by ID",
    params(("id" = i32, Path, description = "Song ID")),
    responses(
        (status = 200, description = "Song details", body = SongResponse),
        (status = 404, description = "Song not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SongResponse>, AppError> {
    let model = state.media.find_song(id).await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;
    Ok(Json(SongResponse::new(model, singer)))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Songs",
    operation_id = "createSong",
    summary = "Create a song",
    description = "Multipart form with `name`, `genre`, optional `album_id`, a `song` audio file (audio/mpeg, audio/mp3 or audio/wav, at most 20 MiB) \
        and a `cover` image. Both files are removed again if the row cannot be written.",
    request_body(content_type = "multipart/form-data", description = "`name`, `genre`, `album_id`, `song` and `cover`"),
    responses(
        (status = 201, description = "Song created", body = SongResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Album belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Album not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate song name (CONFLICT)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, form), fields(user_id = auth_user.user_id))]
pub async fn create_song(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut form: MediaForm,
) -> Result<impl IntoResponse, AppError> {
    let request = NewSong {
        name: form.require_text("name")?,
        genre: form.require_text("genre")?,
        album_id: form.optional_id("album_id")?,
    };
    let audio = form.require_file("song")?;
    let cover = form.require_file("cover")?;

    let model = state
        .media
        .create_song(auth_user.user_id, request, audio, cover)
        .await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;

    Ok((StatusCode::CREATED, Json(SongResponse::new(model, singer))))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Songs",
    operation_id = "updateSong",
    summary = "Update a song",
    description = "Multipart form; every part is optional. Replaced `song` or `cover` files are deleted once the update has committed. \
        Returns 409 CONFLICT if the song changed since it was read.",
    params(("id" = i32, Path, description = "Song ID")),
    request_body(content_type = "multipart/form-data", description = "Optional `name`, `genre`, `song` and `cover`"),
    responses(
        (status = 200, description = "Song updated", body = SongResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Song not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate name or concurrent update (CONFLICT)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, form), fields(user_id = auth_user.user_id))]
pub async fn update_song(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut form: MediaForm,
) -> Result<Json<SongResponse>, AppError> {
    let changes = SongChanges {
        name: form.text("name").map(str::to_owned),
        genre: form.text("genre").map(str::to_owned),
    };
    let uploads = SongUploads {
        audio: form.take_file("song"),
        cover: form.take_file("cover"),
    };

    let model = state
        .media
        .update_song(id, auth_user.user_id, changes, uploads)
        .await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;

    Ok(Json(SongResponse::new(model, singer)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Songs",
    operation_id = "deleteSong",
    summary = "Delete a song",
    description = "Deletes the song row, its likes, its audio file and its cover.",
    params(("id" = i32, Path, description = "Song ID")),
    responses(
        (status = 200, description = "The deleted song", body = SongResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Song not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Interrupted delete (PARTIAL_DELETE)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_song(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SongResponse>, AppError> {
    let model = state.media.delete_song(id, auth_user.user_id).await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;
    Ok(Json(SongResponse::new(model, singer)))
}

#[utoipa::path(
    post,
    path = "/{id}/like",
    tag = "Songs",
    operation_id = "toggleLike",
    summary = "Like or unlike a song",
    description = "Flips the caller's like on the song and returns the new state with the song's like count.",
    params(("id" = i32, Path, description = "Song ID")),
    responses(
        (status = 200, description = "New like state", body = LikeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Song or user not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Toggle contended, retry (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn toggle_like(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<LikeResponse>, AppError> {
    let outcome = state.likes.toggle(auth_user.user_id, id).await?;
    let verb = if outcome.liked { "liked" } else { "unliked" };

    Ok(Json(LikeResponse {
        detail: format!("Successfully {verb} song with id {id}"),
        liked: outcome.liked,
        like_count: outcome.like_count,
    }))
}
