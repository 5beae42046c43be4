use axum::{
    debug_handler,
    extract::{Query, State},
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    ApiResponse, AppResult,
    auth::CurrentUser,
    db::{self, Chat, Message, Page, PageQuery, Pagination, Profile},
};

const DEFAULT_LIMIT: u32 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatSummary {
    #[serde(flatten)]
    chat: Chat,
    other_user: Option<Profile>,
    latest_message: Option<Message>,
    unread_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatList {
    items: Vec<ChatSummary>,
    pagination: Pagination,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn my_chats(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<ChatList>> {
    let page = Page::from_query(query, DEFAULT_LIMIT);
    let (chats, total) = db::chats::list_for_user(&db_pool, user.id, page).await?;

    let mut items = Vec::with_capacity(chats.len());
    for chat in chats {
        let other_user = db::users::find_profile(&db_pool, chat.other_participant(user.id)).await?;
        let latest_message = db::messages::latest(&db_pool, chat.id).await?;
        let unread_count = db::messages::count_unread(&db_pool, chat.id, user.id).await?;
        items.push(ChatSummary {
            chat,
            other_user,
            latest_message,
            unread_count,
        });
    }

    Ok(ApiResponse::ok(
        "Chats retrieved successfully",
        ChatList {
            items,
            pagination: Pagination::new(page, total),
        },
    ))
}
