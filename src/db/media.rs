use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{now, stamp};
use crate::images::UploadedImage;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: Uuid,
    pub message_id: Uuid,
    pub image_id: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn create<'e, E: SqliteExecutor<'e>>(
    executor: E,
    message_id: Uuid,
    image: &UploadedImage,
) -> Result<Media, sqlx::Error> {
    let media = Media {
        id: Uuid::now_v7(),
        message_id,
        image_id: image.id.clone(),
        url: image.url.clone(),
        created_at: now(),
    };

    sqlx::query("INSERT INTO media (id,message_id,image_id,url,created_at) VALUES (?,?,?,?,?)")
        .bind(media.id)
        .bind(media.message_id)
        .bind(&media.image_id)
        .bind(&media.url)
        .bind(stamp(media.created_at))
        .execute(executor)
        .await?;

    Ok(media)
}

pub async fn list_by_message(db_pool: &SqlitePool, message_id: Uuid) -> Result<Vec<Media>, sqlx::Error> {
    sqlx::query_as("SELECT id,message_id,image_id,url,created_at FROM media WHERE message_id=? ORDER BY id")
        .bind(message_id)
        .fetch_all(db_pool)
        .await
}
