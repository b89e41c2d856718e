pub mod album;
pub mod song;
pub mod song_like;
pub mod user;
