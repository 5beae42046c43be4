#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use campus_chat::{
    AppState,
    auth::{self, AuthMode, Verifier},
    bridge::{Bridge, Fact},
    config::Config,
    db::{self, User},
    dispatch::Dispatcher,
    events::ServerEvent,
    images::{ImageStore, ImageUpload, UploadedImage},
    presence::Connection,
    session::Session,
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret";

pub async fn memory_pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::migrate(&db_pool).await.unwrap();
    db_pool
}

pub async fn user(db_pool: &SqlitePool, name: &str) -> User {
    let email = format!("{}@campus.test", name.to_lowercase());
    db::users::insert(db_pool, name, &email, Some("https://img.test/avatar.png"))
        .await
        .unwrap()
}

/// Hands out predictable urls instead of talking to a hosting service.
#[derive(Default)]
pub struct FakeImages {
    uploads: AtomicUsize,
}

impl FakeImages {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for FakeImages {
    async fn upload(&self, image: ImageUpload) -> anyhow::Result<UploadedImage> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(UploadedImage {
            id: format!("img-{n}"),
            url: format!("https://img.test/{n}/{}", image.file_name),
        })
    }
}

pub struct Harness {
    pub state: AppState,
    pub images: Arc<FakeImages>,
    pub facts: mpsc::Receiver<Fact>,
}

pub async fn harness() -> Harness {
    let db_pool = memory_pool().await;
    let images = Arc::new(FakeImages::default());
    let (bridge, facts) = Bridge::channel(16);
    let state = AppState {
        db_pool,
        verifier: Arc::new(Verifier::new(SECRET, AuthMode::Bearer, "token")),
        hub: Arc::new(Dispatcher::default()),
        bridge,
        images: images.clone(),
    };
    Harness { state, images, facts }
}

/// Router config as the environment would give it, plus `overrides`.
pub fn config_with(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_owned(), "sqlite::memory:".to_owned()),
        ("JWT_SECRET".to_owned(), SECRET.to_owned()),
    ]);
    env.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn config() -> Config {
    config_with(&[])
}

pub fn token(user_id: Uuid) -> String {
    auth::issue(SECRET, user_id, time::Duration::hours(1)).unwrap()
}

/// A live session plus the outbox its socket writer would drain.
pub fn connect(state: &AppState, user: &User) -> (Session, mpsc::Receiver<ServerEvent>) {
    let (conn, outbox) = Connection::new(user.id);
    let session = Session::open(state.db_pool.clone(), state.hub.clone(), user.profile(), conn);
    (session, outbox)
}

pub fn drain(outbox: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = outbox.try_recv() {
        events.push(event);
    }
    events
}
