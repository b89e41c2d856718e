use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{album, song};
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/albums", album_routes())
        .nest("/songs", song_routes())
}

fn album_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(album::list_albums, album::create_album))
        .routes(routes!(
            album::get_album,
            album::update_album,
            album::delete_album
        ))
}

fn song_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(song::list_songs, song::create_song))
        .routes(routes!(song::get_song, song::update_song, song::delete_song))
        .routes(routes!(song::toggle_like))
}
