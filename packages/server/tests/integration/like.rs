use std::collections::BTreeMap;

use futures::future::join_all;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseBackend, EntityTrait, MockDatabase, MockExecResult, PaginatorTrait,
    QueryFilter, Value,
};

use catalog_server::coordinator::{CoordinatorError, LikeToggle, NewSong};
use catalog_server::entity::{song, song_like};

use crate::common::{FaultyStore, coordinator, mp3, png, seed_user, test_db};

async fn setup() -> (sea_orm::DatabaseConnection, i32) {
    let db = test_db().await;
    seed_user(&db, 1, "singer").await;
    let media = coordinator(&db, FaultyStore::new());
    let created = media
        .create_song(
            1,
            NewSong {
                name: "Money".into(),
                genre: "rock".into(),
                album_id: None,
            },
            mp3(10),
            png(10),
        )
        .await
        .unwrap();
    (db, created.id)
}

async fn edges(db: &sea_orm::DatabaseConnection, song_id: i32) -> u64 {
    song_like::Entity::find()
        .filter(song_like::Column::SongId.eq(song_id))
        .count(db)
        .await
        .unwrap()
}

async fn stored_count(db: &sea_orm::DatabaseConnection, song_id: i32) -> i32 {
    song::Entity::find_by_id(song_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .like_count
}

#[tokio::test]
async fn toggle_flips_between_liked_and_unliked() {
    let (db, song_id) = setup().await;
    seed_user(&db, 3, "fan").await;
    let likes = LikeToggle::new(db.clone(), 3);

    let first = likes.toggle(3, song_id).await.unwrap();
    assert!(first.liked);
    assert_eq!(first.like_count, 1);
    assert_eq!(edges(&db, song_id).await, 1);

    let second = likes.toggle(3, song_id).await.unwrap();
    assert!(!second.liked);
    assert_eq!(second.like_count, 0);
    assert_eq!(edges(&db, song_id).await, 0);
}

#[tokio::test]
async fn missing_song_or_user_is_not_found() {
    let (db, song_id) = setup().await;
    let likes = LikeToggle::new(db.clone(), 3);

    assert!(matches!(
        likes.toggle(1, song_id + 1).await,
        Err(CoordinatorError::NotFound(_))
    ));
    assert!(matches!(
        likes.toggle(77, song_id).await,
        Err(CoordinatorError::NotFound(_))
    ));
    assert_eq!(stored_count(&db, song_id).await, 0);
}

#[tokio::test]
async fn parallel_toggle_requests_from_one_user_stay_consistent() {
    let (db, song_id) = setup().await;
    seed_user(&db, 3, "fan").await;
    let likes = LikeToggle::new(db.clone(), 10);

    for n in [7usize, 8] {
        let results = join_all((0..n).map(|_| {
            let likes = likes.clone();
            tokio::spawn(async move { likes.toggle(3, song_id).await })
        }))
        .await;
        for result in results {
            result.unwrap().unwrap();
        }

        let surviving = edges(&db, song_id).await;
        assert!(surviving <= 1);
        assert_eq!(stored_count(&db, song_id).await as u64, surviving);
    }
}

#[tokio::test]
async fn counter_tracks_many_users() {
    let (db, song_id) = setup().await;
    for id in 10..15 {
        seed_user(&db, id, &format!("fan{id}")).await;
    }
    let likes = LikeToggle::new(db.clone(), 5);

    let results = join_all((10..15).map(|user_id| {
        let likes = likes.clone();
        tokio::spawn(async move { likes.toggle(user_id, song_id).await })
    }))
    .await;
    for result in results {
        assert!(result.unwrap().unwrap().liked);
    }

    assert_eq!(edges(&db, song_id).await, 5);
    assert_eq!(stored_count(&db, song_id).await, 5);
}

#[tokio::test]
async fn recount_repairs_a_drifted_counter() {
    let (db, song_id) = setup().await;
    seed_user(&db, 3, "fan").await;
    let likes = LikeToggle::new(db.clone(), 3);
    likes.toggle(3, song_id).await.unwrap();

    song::Entity::update_many()
        .col_expr(song::Column::LikeCount, Expr::value(42))
        .filter(song::Column::Id.eq(song_id))
        .exec(&db)
        .await
        .unwrap();

    assert_eq!(likes.recount(song_id).await.unwrap(), 1);
    assert_eq!(stored_count(&db, song_id).await, 1);
    assert!(matches!(
        likes.recount(song_id + 1).await,
        Err(CoordinatorError::NotFound(_))
    ));
}

fn song_row(like_count: i32) -> BTreeMap<&'static str, Value> {
    let now = chrono::Utc::now();
    BTreeMap::from([
        ("id", 7i32.into()),
        ("name", "Money".into()),
        ("genre", "rock".into()),
        ("singer_id", 1i32.into()),
        ("album_id", Option::<i32>::None.into()),
        ("like_count", like_count.into()),
        ("cover", "1/song_cover/a.png".into()),
        ("cover_url", "http://media.test/1/song_cover/a.png".into()),
        ("song", "1/song_file/a.mp3".into()),
        ("song_url", "http://media.test/1/song_file/a.mp3".into()),
        ("version", 1i32.into()),
        ("created_at", now.into()),
        ("updated_at", now.into()),
    ])
}

fn user_row() -> BTreeMap<&'static str, Value> {
    BTreeMap::from([
        ("id", 3i32.into()),
        ("username", "fan".into()),
        ("fullname", "Fan".into()),
        ("email", "fan@example.com".into()),
        ("created_at", chrono::Utc::now().into()),
    ])
}

fn rows(affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: affected,
    }
}

#[tokio::test]
async fn toggle_that_loses_the_edge_insert_starts_over() {
    // Attempt 1 finds no edge but inserts nothing: another toggle got there first.
    // Attempt 2 sees that edge and removes it.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![song_row(0)]])
        .append_query_results([vec![user_row()]])
        .append_query_results([vec![song_row(1)]])
        .append_query_results([vec![user_row()]])
        .append_query_results([vec![song_row(0)]])
        .append_exec_results([rows(0), rows(0), rows(1), rows(1)])
        .into_connection();

    let outcome = LikeToggle::new(db, 3).toggle(3, 7).await.unwrap();
    assert!(!outcome.liked);
    assert_eq!(outcome.like_count, 0);
}

#[tokio::test]
async fn toggle_gives_up_after_losing_every_attempt() {
    let mut mock = MockDatabase::new(DatabaseBackend::Postgres);
    for _ in 0..2 {
        mock = mock
            .append_query_results([vec![song_row(1)]])
            .append_query_results([vec![user_row()]])
            .append_exec_results([rows(0), rows(0)]);
    }

    let err = LikeToggle::new(mock.into_connection(), 2)
        .toggle(3, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)), "{err:?}");
}

#[tokio::test]
async fn zero_attempts_still_tries_once() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![song_row(0)]])
        .append_query_results([vec![user_row()]])
        .append_query_results([vec![song_row(1)]])
        .append_exec_results([rows(0), rows(1), rows(1)])
        .into_connection();

    let outcome = LikeToggle::new(db, 0).toggle(3, 7).await.unwrap();
    assert!(outcome.liked);
    assert_eq!(outcome.like_count, 1);
}
