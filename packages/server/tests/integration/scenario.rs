//! The album and like walkthrough from the catalog's design notes, end to end.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};

use catalog_server::coordinator::{AlbumChanges, CoordinatorError, LikeToggle, NewAlbum};
use catalog_server::entity::song;

use crate::common::{FaultyStore, coordinator, png, seed_user, test_db};

#[tokio::test]
async fn album_and_like_walkthrough() {
    let db = test_db().await;
    seed_user(&db, 42, "echoes").await;
    seed_user(&db, 3, "listener").await;
    let store = FaultyStore::new();
    let media = coordinator(&db, store.clone());

    let album = media
        .create_album(42, NewAlbum { name: "Echoes".into() }, png(500 * 1024))
        .await
        .unwrap();
    assert_eq!(store.inner.keys(), vec![album.cover.clone()]);
    assert!(store.inner.contains(&album.cover_url));

    let err = media
        .create_album(42, NewAlbum { name: "Echoes".into() }, png(500 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
    assert_eq!(store.inner.len(), 1);

    let err = media
        .update_album(album.id, 42, AlbumChanges::default(), Some(png(2 * 1024 * 1024)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::ValidationFailed { .. }));
    assert_eq!(store.inner.keys(), vec![album.cover.clone()]);
    assert_eq!(media.find_album(album.id).await.unwrap(), album);

    let now = Utc::now();
    song::ActiveModel {
        id: Set(7),
        name: Set("Time".into()),
        genre: Set("rock".into()),
        singer_id: Set(42),
        album_id: Set(Some(album.id)),
        like_count: Set(0),
        cover: Set("42/song_cover/time.png".into()),
        cover_url: Set("http://media.test/42/song_cover/time.png".into()),
        song: Set("42/song_file/time.mp3".into()),
        song_url: Set("http://media.test/42/song_file/time.mp3".into()),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let likes = LikeToggle::new(db.clone(), 3);
    let liked = likes.toggle(3, 7).await.unwrap();
    let unliked = likes.toggle(3, 7).await.unwrap();
    assert!(liked.liked);
    assert!(!unliked.liked);
    assert_eq!(unliked.like_count, 0);
}
