use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::coordinator::{AlbumChanges, NewAlbum};
use crate::entity::album;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::multipart::MediaForm;
use crate::models::album::*;
use crate::state::AppState;

use super::singer_summary;

#[utoipa::path(
    get,
    path = "/",
    tag = "Albums",
    operation_id = "listAlbums",
    summary = "List a user's albums",
    description = "Returns one page of the albums owned by `user_id`, newest first. `per_page` (alias `itemPerPage`) is clamped to 10-30.",
    params(ListQuery),
    responses(
        (status = 200, description = "Albums", body = AlbumListResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn list_albums(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AlbumListResponse>, AppError> {
    let (page, per_page) = query.window();
    let select = album::Entity::find().filter(album::Column::SingerId.eq(query.user_id));

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let albums = select
        .order_by_desc(album::Column::CreatedAt)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let singer = singer_summary(&state.db, query.user_id).await?;
    let data = albums
        .into_iter()
        .map(|m| AlbumResponse::new(m, singer.clone()))
        .collect();

    Ok(Json(AlbumListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Albums",
    operation_id = "getAlbum",
    summary = "Get an album by ID",
    params(("id" = i32, Path, description = "Album ID")),
    responses(
        (status = 200, description = "Album details", body = AlbumResponse),
        (status = 404, description = "Album not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_album(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AlbumResponse>, AppError> {
    let model = state.media.find_album(id).await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;
    Ok(Json(AlbumResponse::new(model, singer)))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Albums",
    operation_id = "createAlbum",
    summary = "Create an album",
    description = "Multipart form with a `name` field and a `cover` file (image/jpeg or image/png, at most 1 MiB). \
        The cover is uploaded before the row is written and removed again if the write fails.",
    request_body(content_type = "multipart/form-data", description = "`name` and `cover`"),
    responses(
        (status = 201, description = "Album created", body = AlbumResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Duplicate album name (CONFLICT)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, form), fields(user_id = auth_user.user_id))]
pub async fn create_album(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut form: MediaForm,
) -> Result<impl IntoResponse, AppError> {
    let request = NewAlbum {
        name: form.require_text("name")?,
    };
    let cover = form.require_file("cover")?;

    let model = state
        .media
        .create_album(auth_user.user_id, request, cover)
        .await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;

    Ok((StatusCode::CREATED, Json(AlbumResponse::new(model, singer))))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Albums",
    operation_id = "updateAlbum",
    summary = "Update an album",
    description = "Multipart form; every part is optional. A new `cover` replaces the old one, which is deleted once the update has committed. \
        Returns 409 CONFLICT if the album changed since it was read.",
    params(("id" = i32, Path, description = "Album ID")),
    request_body(content_type = "multipart/form-data", description = "Optional `name` and `cover`"),
    responses(
        (status = 200, description = "Album updated", body = AlbumResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Album not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate name or concurrent update (CONFLICT)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, form), fields(user_id = auth_user.user_id))]
pub async fn update_album(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut form: MediaForm,
) -> Result<Json<AlbumResponse>, AppError> {
    let changes = AlbumChanges {
        name: form.text("name").map(str::to_owned),
    };
    let cover = form.take_file("cover");

    let model = state
        .media
        .update_album(id, auth_user.user_id, changes, cover)
        .await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;

    Ok(Json(AlbumResponse::new(model, singer)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Albums",
    operation_id = "deleteAlbum",
    summary = "Delete an album",
    description = "Deletes the album row and its cover. Songs on the album are kept as singles.",
    params(("id" = i32, Path, description = "Album ID")),
    responses(
        (status = 200, description = "The deleted album", body = AlbumResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Album not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Interrupted delete (PARTIAL_DELETE)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_album(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AlbumResponse>, AppError> {
    let model = state.media.delete_album(id, auth_user.user_id).await?;
    let singer = singer_summary(&state.db, model.singer_id).await?;
    Ok(Json(AlbumResponse::new(model, singer)))
}
