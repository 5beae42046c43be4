use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    ApiResponse, AppResult, AppState,
    auth::CurrentUser,
    bridge::Fact,
    chats::access::{self, NOT_PARTICIPANT},
    db::{self, User},
    error::ChatError,
    events::{MediaRef, MessageKind, NewMessage},
    images::ImageUpload,
};

const DEFAULT_CONTENT: &str = "📷 Image";

#[derive(Debug, Serialize)]
pub(crate) struct ImageMessage {
    message: NewMessage,
}

#[debug_handler]
pub(crate) async fn image_message(
    Path(chat_id): Path<Uuid>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,

    mut multipart: Multipart,
) -> AppResult<(StatusCode, ApiResponse<ImageMessage>)> {
    let mut content = None;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(ChatError::Upload)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("content") => {
                content = Some(field.text().await.map_err(ChatError::Upload)?);
            }
            Some("images") => {
                let file_name = field.file_name().unwrap_or("image").to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(ChatError::Upload)?;
                uploads.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let message = send_image_message(&state, &user, chat_id, content, uploads).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Image message sent successfully", ImageMessage { message }),
    ))
}

/// Uploads the images, stores the message with its media in one
/// transaction, then hands delivery to the bridge.
pub async fn send_image_message(
    state: &AppState,
    sender: &User,
    chat_id: Uuid,
    content: Option<String>,
    uploads: Vec<ImageUpload>,
) -> AppResult<NewMessage> {
    if uploads.is_empty() {
        return Err(ChatError::Validation(
            "This endpoint is for image messages only. Use the socket for text messages.",
        )
        .into());
    }

    let chat = access::participant_chat(&state.db_pool, chat_id, sender.id, "Chat not found", NOT_PARTICIPANT).await?;

    let uploaded = try_join_all(uploads.into_iter().map(|upload| state.images.upload(upload))).await?;

    let content = content
        .as_deref()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .unwrap_or(DEFAULT_CONTENT);

    let mut tx = state.db_pool.begin().await?;
    let message = db::messages::create(&mut *tx, chat_id, sender.id, content).await?;
    let mut media = Vec::with_capacity(uploaded.len());
    for image in &uploaded {
        media.push(db::media::create(&mut *tx, message.id, image).await?);
    }
    db::chats::touch(&mut *tx, chat_id).await?;
    tx.commit().await?;

    let message = NewMessage::new(
        message,
        sender.profile(),
        MessageKind::Image {
            media: media.iter().map(MediaRef::from).collect(),
        },
        None,
    );

    let published = state.bridge.publish(Fact::MessageCreated {
        message: message.clone(),
        recipient_id: chat.other_participant(sender.id),
    });
    if !published {
        warn!(message_id = %message.id, %chat_id, "image message stored but not pushed live");
    }

    info!(user_id = %sender.id, %chat_id, message_id = %message.id, images = media.len(), "image message sent");
    Ok(message)
}
