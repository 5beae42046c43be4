use axum::{
    debug_handler,
    extract::{Path, State},
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{
    ApiResponse, AppResult,
    auth::CurrentUser,
    bridge::{Bridge, Fact},
    chats::access,
    db::Message,
};

#[derive(Debug, Serialize)]
pub(crate) struct MarkedRead {
    message: Message,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_read(
    Path(message_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(bridge): State<Bridge>,
    CurrentUser(user): CurrentUser,
) -> AppResult<ApiResponse<MarkedRead>> {
    let (message, receipt) = access::mark_read(&db_pool, user.id, message_id).await?;

    bridge.publish(Fact::MessageRead {
        receipt,
        chat_id: message.chat_id,
        sender_id: message.sender_id,
    });
    info!(user_id = %user.id, %message_id, "message marked as read");

    Ok(ApiResponse::ok("Message marked as read", MarkedRead { message }))
}
