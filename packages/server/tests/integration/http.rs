use reqwest::multipart::Form;

use crate::common::{TestApp, file_part, routes};

fn album_form(name: &str, cover: Vec<u8>, mime: &str) -> Form {
    Form::new()
        .text("name", name.to_string())
        .part("cover", file_part(cover, "cover.png", mime))
}

fn song_form(name: &str) -> Form {
    Form::new()
        .text("name", name.to_string())
        .text("genre", "rock")
        .part("song", file_part(vec![0xFF; 64], "track.mp3", "audio/mpeg"))
        .part("cover", file_part(vec![0x89; 64], "cover.png", "image/png"))
}

#[tokio::test]
async fn album_lifecycle_over_http() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user(1, "singer").await;

    let res = app
        .post_form(routes::ALBUMS, album_form("Echoes", vec![1; 128], "image/png"), Some(&token))
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    let id = res.body["id"].as_i64().unwrap() as i32;
    assert_eq!(res.body["name"], "Echoes");
    assert_eq!(res.body["singer"]["username"], "singer");
    assert!(res.body.get("cover").is_none());
    let cover_url = res.body["cover_url"].as_str().unwrap().to_string();
    assert!(app.store.inner.contains(&cover_url));

    let res = app.get(&routes::album(id)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["version"], 1);

    let res = app
        .get(&format!("{}?user_id=1&page=1&itemPerPage=50", routes::ALBUMS))
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["pagination"]["per_page"], 30);
    assert_eq!(res.body["pagination"]["total"], 1);

    let form = Form::new().text("name", "Echoes II");
    let res = app.put_form(&routes::album(id), form, &token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["name"], "Echoes II");
    assert_eq!(res.body["version"], 2);

    let res = app.delete_with_token(&routes::album(id), &token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert!(app.store.inner.is_empty());

    let res = app.get(&routes::album(id)).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn writes_require_a_valid_token() {
    let app = TestApp::spawn().await;

    let res = app
        .post_form(routes::ALBUMS, album_form("Echoes", vec![1; 16], "image/png"), None)
        .await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");

    let res = app
        .post_form(
            routes::ALBUMS,
            album_form("Echoes", vec![1; 16], "image/png"),
            Some("not-a-jwt"),
        )
        .await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
    assert!(app.store.inner.is_empty());
}

#[tokio::test]
async fn error_codes_follow_the_taxonomy() {
    let app = TestApp::spawn().await;
    let owner = app.create_authenticated_user(1, "singer").await;
    let intruder = app.create_authenticated_user(2, "intruder").await;

    let res = app
        .post_form(routes::ALBUMS, album_form("Echoes", vec![1; 16], "image/gif"), Some(&owner))
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    let res = app
        .post_form(routes::ALBUMS, Form::new().text("name", "Echoes"), Some(&owner))
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    let res = app
        .post_form(routes::ALBUMS, album_form("Echoes", vec![1; 16], "image/png"), Some(&owner))
        .await;
    assert_eq!(res.status, 201);
    let id = res.body["id"].as_i64().unwrap() as i32;

    let res = app
        .post_form(routes::ALBUMS, album_form("Echoes", vec![1; 16], "image/png"), Some(&owner))
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "CONFLICT");

    let res = app.delete_with_token(&routes::album(id), &intruder).await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");

    app.store.fail_puts_in("album_cover");
    let res = app
        .post_form(routes::ALBUMS, album_form("Other", vec![1; 16], "image/png"), Some(&owner))
        .await;
    assert_eq!(res.status, 502);
    assert_eq!(res.body["code"], "UPSTREAM_FAILURE");
    assert!(!res.text.contains("injected"));
    assert_eq!(app.store.inner.len(), 1);
}

#[tokio::test]
async fn song_like_and_partial_delete_over_http() {
    let app = TestApp::spawn().await;
    let owner = app.create_authenticated_user(1, "singer").await;
    let fan = app.create_authenticated_user(2, "fan").await;

    let res = app.post_form(routes::SONGS, song_form("Money"), Some(&owner)).await;
    assert_eq!(res.status, 201, "{}", res.text);
    let id = res.body["id"].as_i64().unwrap() as i32;
    assert_eq!(res.body["like_count"], 0);

    let res = app.post_with_token(&routes::song_like(id), &fan).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["liked"], true);
    assert_eq!(res.body["like_count"], 1);
    assert_eq!(
        res.body["detail"],
        format!("Successfully liked song with id {id}")
    );

    let res = app
        .get(&format!("{}?user_id=1", routes::SONGS))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["data"][0]["like_count"], 1);

    app.store.fail_deletes_of("song_cover");
    let res = app.delete_with_token(&routes::song(id), &owner).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body["code"], "PARTIAL_DELETE");

    app.store.heal();
    let res = app.delete_with_token(&routes::song(id), &owner).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert!(app.store.inner.is_empty());

    let res = app.post_with_token(&routes::song_like(id), &fan).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn api_reference_is_served() {
    let app = TestApp::spawn().await;
    let res = app.get("/scalar").await;
    assert_eq!(res.status, 200);
}
