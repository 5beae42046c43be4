use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Page, now, stamp};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    // reserved: nothing sets this yet
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

const COLUMNS: &str = "id,chat_id,sender_id,content,sent_at,delivered_at,read_at";

pub async fn create<'e, E: SqliteExecutor<'e>>(
    executor: E,
    chat_id: Uuid,
    sender_id: Uuid,
    content: &str,
) -> Result<Message, sqlx::Error> {
    let message = Message {
        id: Uuid::now_v7(),
        chat_id,
        sender_id,
        content: content.to_owned(),
        sent_at: now(),
        delivered_at: None,
        read_at: None,
    };

    sqlx::query("INSERT INTO messages (id,chat_id,sender_id,content,sent_at) VALUES (?,?,?,?,?)")
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(stamp(message.sent_at))
        .execute(executor)
        .await?;

    Ok(message)
}

pub async fn find_by_id(db_pool: &SqlitePool, id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {COLUMNS} FROM messages WHERE id=?"))
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

/// Newest first.
pub async fn list_by_chat(db_pool: &SqlitePool, chat_id: Uuid, page: Page) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM messages WHERE chat_id=? ORDER BY sent_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(chat_id)
    .bind(page.limit as i64)
    .bind(page.offset())
    .fetch_all(db_pool)
    .await
}

pub async fn count_by_chat(db_pool: &SqlitePool, chat_id: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id=?")
        .bind(chat_id)
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

pub async fn latest(db_pool: &SqlitePool, chat_id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    Ok(list_by_chat(db_pool, chat_id, Page::new(1, 1)).await?.pop())
}

/// Messages in the chat that `reader` received and hasn't read.
pub async fn count_unread(db_pool: &SqlitePool, chat_id: Uuid, reader: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id=? AND sender_id<>? AND read_at IS NULL")
            .bind(chat_id)
            .bind(reader)
            .fetch_one(db_pool)
            .await?;
    Ok(count)
}

/// Stamps `read_at` if it is still unset and returns the stored row, so the
/// first read wins.
pub async fn mark_read(db_pool: &SqlitePool, id: Uuid) -> Result<Message, sqlx::Error> {
    sqlx::query("UPDATE messages SET read_at=? WHERE id=? AND read_at IS NULL")
        .bind(stamp(now()))
        .bind(id)
        .execute(db_pool)
        .await?;

    find_by_id(db_pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}
