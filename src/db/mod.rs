pub mod chats;
pub mod media;
pub mod messages;
pub mod users;

use std::str::FromStr;

use serde::Serialize;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

pub use chats::Chat;
pub use media::Media;
pub use messages::Message;
pub use users::User;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        avatar TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id BLOB PRIMARY KEY NOT NULL,
        user1_id BLOB NOT NULL REFERENCES users(id),
        user2_id BLOB NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (user1_id <> user2_id)
    )"#,
    // one chat per unordered pair
    r#"CREATE UNIQUE INDEX IF NOT EXISTS chats_pair
        ON chats (min(user1_id, user2_id), max(user1_id, user2_id))"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id BLOB PRIMARY KEY NOT NULL,
        chat_id BLOB NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
        sender_id BLOB NOT NULL REFERENCES users(id),
        content TEXT NOT NULL,
        sent_at TEXT NOT NULL,
        delivered_at TEXT,
        read_at TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS messages_chat_sent ON messages (chat_id, sent_at)",
    r#"CREATE TABLE IF NOT EXISTS media (
        id BLOB PRIMARY KEY NOT NULL,
        message_id BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
        image_id TEXT NOT NULL,
        url TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS media_message ON media (message_id)",
];

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

/// What other users get to see of someone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: u32,
    pub limit: Option<u32>,
}

impl Default for PageQuery {
    fn default() -> Self {
        PageQuery { page: 1, limit: None }
    }
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Page {
        Page {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn from_query(query: PageQuery, default_limit: u32) -> Page {
        Page::new(query.page, query.limit.unwrap_or(default_limit))
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: Page, total: i64) -> Pagination {
        let limit = page.limit as i64;
        Pagination {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: (total + limit - 1) / limit,
            has_next: (page.page as i64) * limit < total,
            has_prev: page.page > 1,
        }
    }
}

pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Storage form of a timestamp: UTC, nine fraction digits, so text order is
/// time order. Reads go back through sqlx's RFC 3339 decoding.
pub(crate) fn stamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.nanosecond(),
    )
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&db_pool).await.unwrap();
    db_pool
}
