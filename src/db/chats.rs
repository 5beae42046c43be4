use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Page, now, stamp};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    #[serde(rename = "user1_id")]
    pub user1_id: Uuid,
    #[serde(rename = "user2_id")]
    pub user2_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Chat {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that isn't `user_id`. Only meaningful for participants.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

const COLUMNS: &str = "id,user1_id,user2_id,created_at,updated_at";

pub async fn find_by_id(db_pool: &SqlitePool, id: Uuid) -> Result<Option<Chat>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {COLUMNS} FROM chats WHERE id=?"))
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

/// Looks the pair up in both orderings.
pub async fn find_by_users(db_pool: &SqlitePool, a: Uuid, b: Uuid) -> Result<Option<Chat>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM chats WHERE (user1_id=? AND user2_id=?) OR (user1_id=? AND user2_id=?)"
    ))
    .bind(a)
    .bind(b)
    .bind(b)
    .bind(a)
    .fetch_optional(db_pool)
    .await
}

/// Returns the chat between `a` and `b`, creating it if needed. The flag is
/// true when this call created it.
pub async fn create_or_get(db_pool: &SqlitePool, a: Uuid, b: Uuid) -> Result<(Chat, bool), sqlx::Error> {
    if let Some(chat) = find_by_users(db_pool, a, b).await? {
        return Ok((chat, false));
    }

    let created_at = now();
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO chats (id,user1_id,user2_id,created_at,updated_at) VALUES (?,?,?,?,?)",
    )
    .bind(Uuid::now_v7())
    .bind(a)
    .bind(b)
    .bind(stamp(created_at))
    .bind(stamp(created_at))
    .execute(db_pool)
    .await?
    .rows_affected()
        == 1;

    // a concurrent request may have won the pair index
    let chat = find_by_users(db_pool, a, b)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((chat, inserted))
}

pub async fn touch<'e, E: SqliteExecutor<'e>>(executor: E, id: Uuid) -> Result<OffsetDateTime, sqlx::Error> {
    let updated_at = now();
    sqlx::query("UPDATE chats SET updated_at=? WHERE id=?")
        .bind(stamp(updated_at))
        .bind(id)
        .execute(executor)
        .await?;
    Ok(updated_at)
}

/// The user's chats, most recent activity first.
pub async fn list_for_user(db_pool: &SqlitePool, user_id: Uuid, page: Page) -> Result<(Vec<Chat>, i64), sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats WHERE user1_id=? OR user2_id=?")
        .bind(user_id)
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;

    let chats = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM chats WHERE user1_id=? OR user2_id=? ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(user_id)
    .bind(user_id)
    .bind(page.limit as i64)
    .bind(page.offset())
    .fetch_all(db_pool)
    .await?;

    Ok((chats, total))
}
