use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Profile, now, stamp};

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

pub async fn find_by_id(db_pool: &SqlitePool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT id,name,email,avatar,is_active,created_at FROM users WHERE id=?")
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

pub async fn find_profile(db_pool: &SqlitePool, id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
    Ok(find_by_id(db_pool, id).await?.map(|user| user.profile()))
}

/// Accounts are owned by the account service; this exists for seeding.
pub async fn insert(
    db_pool: &SqlitePool,
    name: &str,
    email: &str,
    avatar: Option<&str>,
) -> Result<User, sqlx::Error> {
    let user = User {
        id: Uuid::now_v7(),
        name: name.to_owned(),
        email: email.to_owned(),
        avatar: avatar.map(str::to_owned),
        is_active: true,
        created_at: now(),
    };

    sqlx::query("INSERT INTO users (id,name,email,avatar,is_active,created_at) VALUES (?,?,?,?,?,?)")
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(user.is_active)
        .bind(stamp(user.created_at))
        .execute(db_pool)
        .await?;

    Ok(user)
}

pub async fn set_active(db_pool: &SqlitePool, id: Uuid, is_active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_active=? WHERE id=?")
        .bind(is_active)
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(())
}
