use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::Client;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::Value;

use catalog_server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, LikeConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
use catalog_server::coordinator::{BlobInput, CoordinatorSettings, MediaCoordinator, MediaPolicy};
use catalog_server::entity::user;
use catalog_server::state::AppState;
use ::common::retry::RetryPolicy;
use ::common::storage::memory::MemoryBlobStore;
use ::common::storage::{BlobRef, BlobStore, StorageError};

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";
pub const PUBLIC_BASE: &str = "http://media.test";

/// Fresh in-memory SQLite database with the catalog schema.
///
/// One pooled connection that never expires, so the database lives as long as the pool.
pub async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to open SQLite database");
    catalog_server::database::create_tables(&db)
        .await
        .expect("Failed to create tables");
    catalog_server::database::ensure_indexes(&db)
        .await
        .expect("Failed to create indexes");
    db
}

/// Insert a user with an explicit id.
pub async fn seed_user(db: &DatabaseConnection, id: i32, username: &str) -> user::Model {
    user::ActiveModel {
        id: Set(id),
        username: Set(username.to_string()),
        fullname: Set(format!("{username} fullname")),
        email: Set(format!("{username}@example.com")),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to seed user")
}

pub fn png(len: usize) -> BlobInput {
    BlobInput::new("image/png", vec![0x89u8; len])
}

pub fn mp3(len: usize) -> BlobInput {
    BlobInput::new("audio/mpeg", vec![0xFFu8; len])
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        blob_timeout: Duration::from_secs(5),
        delete_retry: RetryPolicy::immediate(2),
    }
}

pub fn coordinator(db: &DatabaseConnection, store: Arc<dyn BlobStore>) -> MediaCoordinator {
    MediaCoordinator::new(db.clone(), store, MediaPolicy::default(), settings())
}

/// Memory store with switchable faults.
pub struct FaultyStore {
    pub inner: MemoryBlobStore,
    fail_puts_in: Mutex<Option<String>>,
    fail_deletes_of: Mutex<Option<String>>,
    put_delay: Mutex<Option<Duration>>,
    delete_delay: Mutex<Option<Duration>>,
    before_put: Mutex<Option<BoxFuture<'static, ()>>>,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBlobStore::new(PUBLIC_BASE),
            fail_puts_in: Mutex::new(None),
            fail_deletes_of: Mutex::new(None),
            put_delay: Mutex::new(None),
            delete_delay: Mutex::new(None),
            before_put: Mutex::new(None),
        })
    }

    /// Fail every put whose key lies in `folder`.
    pub fn fail_puts_in(&self, folder: &str) {
        *self.fail_puts_in.lock().unwrap() = Some(format!("/{folder}/"));
    }

    /// Fail every delete whose key contains `fragment`.
    pub fn fail_deletes_of(&self, fragment: &str) {
        *self.fail_deletes_of.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn delay_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_deletes(&self, delay: Duration) {
        *self.delete_delay.lock().unwrap() = Some(delay);
    }

    /// Run `hook` once, right before the next put reaches the store.
    pub fn before_next_put(&self, hook: BoxFuture<'static, ()>) {
        *self.before_put.lock().unwrap() = Some(hook);
    }

    pub fn heal(&self) {
        *self.fail_puts_in.lock().unwrap() = None;
        *self.fail_deletes_of.lock().unwrap() = None;
        *self.put_delay.lock().unwrap() = None;
        *self.delete_delay.lock().unwrap() = None;
    }
}

#[async_trait]
impl BlobStore for FaultyStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<BlobRef, StorageError> {
        let hook = self.before_put.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.fail_puts_in.lock().unwrap().clone();
        if failing.is_some_and(|folder| key.contains(&folder)) {
            return Err(StorageError::Backend("injected put failure".into()));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn delete(&self, key_or_url: &str) -> Result<bool, StorageError> {
        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.fail_deletes_of.lock().unwrap().clone();
        if failing.is_some_and(|fragment| key_or_url.contains(&fragment)) {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        self.inner.delete(key_or_url).await
    }

    async fn exists(&self, key_or_url: &str) -> Result<bool, StorageError> {
        self.inner.exists(key_or_url).await
    }

    async fn get(&self, key_or_url: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(key_or_url).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }
}

pub mod routes {
    pub const ALBUMS: &str = "/api/v1/albums";
    pub const SONGS: &str = "/api/v1/songs";

    pub fn album(id: i32) -> String {
        format!("/api/v1/albums/{id}")
    }

    pub fn song(id: i32) -> String {
        format!("/api/v1/songs/{id}")
    }

    pub fn song_like(id: i32) -> String {
        format!("/api/v1/songs/{id}/like")
    }
}

/// A running test server backed by SQLite and a memory blob store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub store: Arc<FaultyStore>,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig::default(),
            max_body_bytes: 64 * 1024 * 1024,
        },
        database: DatabaseConfig::new("sqlite::memory:"),
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            s3: None,
            path: None,
            public_url: PUBLIC_BASE.to_string(),
            operation_timeout_secs: 5,
            compensation_retry: RetryPolicy::immediate(2),
        },
        media: MediaPolicy::default(),
        likes: LikeConfig::default(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let db = test_db().await;
        let store = FaultyStore::new();
        let state = AppState::new(test_config(), db.clone(), store.clone());
        let app = catalog_server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Seed a user and sign a token for them.
    pub async fn create_authenticated_user(&self, id: i32, username: &str) -> String {
        seed_user(&self.db, id, username).await;
        catalog_server::utils::jwt::sign(JWT_SECRET, id, username, chrono::Duration::hours(1))
            .expect("Failed to sign token")
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn post_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        token: Option<&str>,
    ) -> TestResponse {
        let mut req = self.client.post(self.url(path)).multipart(form);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let res = req.send().await.expect("Failed to send multipart POST");

        TestResponse::from_response(res).await
    }

    pub async fn put_form(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        token: &str,
    ) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart PUT");

        TestResponse::from_response(res).await
    }
}

/// A multipart file part.
pub fn file_part(bytes: Vec<u8>, file_name: &str, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .expect("Failed to set MIME type")
}
