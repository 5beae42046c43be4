use axum::{
    Json, debug_handler,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{
    ApiResponse, AppResult,
    auth::CurrentUser,
    chats::{MessageView, with_media},
    db::{self, Chat, Page, Profile},
    error::ChatError,
};

const RECENT_MESSAGES: u32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewChat {
    other_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatView {
    #[serde(flatten)]
    chat: Chat,
    #[serde(rename = "type")]
    kind: &'static str,
    participant_count: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatOpened {
    chat: ChatView,
    other_user: Profile,
    recent_messages: Vec<MessageView>,
    is_new_chat: bool,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_or_get(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,

    Json(NewChat { other_user_id }): Json<NewChat>,
) -> AppResult<Response> {
    let other_id = other_user_id.ok_or(ChatError::Validation(
        "Other user ID is required for private conversation",
    ))?;
    if other_id == user.id {
        return Err(ChatError::Validation("Cannot create conversation with yourself").into());
    }

    let other = db::users::find_by_id(&db_pool, other_id)
        .await?
        .ok_or(ChatError::NotFound("User not found"))?;
    if !other.is_active {
        return Err(ChatError::Validation("Cannot start chat with inactive user").into());
    }

    let (chat, created) = db::chats::create_or_get(&db_pool, user.id, other_id).await?;

    let recent_messages = if created {
        info!(user_id = %user.id, chat_id = %chat.id, %other_id, "one-to-one chat created");
        Vec::new()
    } else {
        let mut messages = db::messages::list_by_chat(&db_pool, chat.id, Page::new(1, RECENT_MESSAGES)).await?;
        messages.reverse();
        with_media(&db_pool, messages).await?
    };

    let (status, message) = if created {
        (StatusCode::CREATED, "One-to-one chat created successfully")
    } else {
        (StatusCode::OK, "Chat retrieved successfully")
    };
    let body = ChatOpened {
        chat: ChatView {
            chat,
            kind: "one-to-one",
            participant_count: 2,
        },
        other_user: other.profile(),
        recent_messages,
        is_new_chat: created,
    };

    Ok((status, ApiResponse::ok(message, body)).into_response())
}
