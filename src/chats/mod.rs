pub mod access;
mod history;
mod images;
mod list;
mod new;
mod read;

pub use images::send_image_message;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    AppState,
    db::{self, Media, Message},
    events::MessageType,
};

/// `max_upload_bytes` bounds the whole multipart body of an image message.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list::my_chats).post(new::create_or_get))
        .route("/{chat_id}/messages", get(history::chat_messages))
        .route(
            "/{chat_id}/images",
            post(images::image_message).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/messages/{message_id}/read", post(read::mark_read))
}

/// A stored message as HTTP clients see it, media included.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub media: Vec<Media>,
}

impl MessageView {
    fn new(message: Message, media: Vec<Media>) -> MessageView {
        let kind = if media.is_empty() { MessageType::Text } else { MessageType::Image };
        MessageView { message, kind, media }
    }
}

/// Attaches media to each message, keeping order.
async fn with_media(db_pool: &SqlitePool, messages: Vec<Message>) -> Result<Vec<MessageView>, sqlx::Error> {
    let mut views = Vec::with_capacity(messages.len());
    for message in messages {
        let media = db::media::list_by_message(db_pool, message.id).await?;
        views.push(MessageView::new(message, media));
    }
    Ok(views)
}
