pub mod album;
pub mod shared;
pub mod song;
