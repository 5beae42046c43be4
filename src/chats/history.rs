use axum::{
    debug_handler,
    extract::{Path, Query, State},
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    ApiResponse, AppResult,
    auth::CurrentUser,
    chats::{
        MessageView,
        access::{self, NOT_PARTICIPANT},
        with_media,
    },
    db::{self, Chat, Page, PageQuery, Pagination},
};

const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Serialize)]
pub(crate) struct ChatHistory {
    messages: Vec<MessageView>,
    pagination: Pagination,
    chat: Chat,
}

/// One page of history, oldest first within the page.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_messages(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<ChatHistory>> {
    let chat = access::participant_chat(&db_pool, chat_id, user.id, "Chat not found", NOT_PARTICIPANT).await?;

    let page = Page::from_query(query, DEFAULT_LIMIT);
    let mut messages = db::messages::list_by_chat(&db_pool, chat_id, page).await?;
    messages.reverse();
    let total = db::messages::count_by_chat(&db_pool, chat_id).await?;

    Ok(ApiResponse::ok(
        "Messages retrieved successfully",
        ChatHistory {
            messages: with_media(&db_pool, messages).await?,
            pagination: Pagination::new(page, total),
            chat,
        },
    ))
}
