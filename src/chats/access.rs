use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{self, Chat, Message},
    error::ChatError,
    events::ReadReceipt,
};

pub const NOT_PARTICIPANT: &str = "You are not part of this chat";

/// Loads a chat the user takes part in.
pub async fn participant_chat(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    user_id: Uuid,
    missing: &'static str,
    forbidden: &'static str,
) -> Result<Chat, ChatError> {
    let chat = db::chats::find_by_id(db_pool, chat_id)
        .await?
        .ok_or(ChatError::NotFound(missing))?;

    if !chat.has_participant(user_id) {
        return Err(ChatError::Forbidden(forbidden));
    }
    Ok(chat)
}

/// Marks a received message read on behalf of `reader`. Re-marking keeps the
/// first timestamp and still yields a receipt.
pub async fn mark_read(
    db_pool: &SqlitePool,
    reader: Uuid,
    message_id: Uuid,
) -> Result<(Message, ReadReceipt), ChatError> {
    let message = db::messages::find_by_id(db_pool, message_id)
        .await?
        .ok_or(ChatError::NotFound("Message not found"))?;

    if message.sender_id == reader {
        return Err(ChatError::Validation("Cannot mark your own message as read"));
    }

    let chat = db::chats::find_by_id(db_pool, message.chat_id).await?;
    if !chat.is_some_and(|chat| chat.has_participant(reader)) {
        return Err(ChatError::Forbidden(NOT_PARTICIPANT));
    }

    let message = db::messages::mark_read(db_pool, message_id).await?;
    let receipt = ReadReceipt {
        message_id,
        read_by: reader,
        read_at: message.read_at,
    };
    Ok((message, receipt))
}
