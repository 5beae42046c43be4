//! Socket wire format. Every frame is a JSON text frame shaped
//! `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{Media, Message, Profile};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat(ChatRef),
    LeaveChat(ChatRef),
    SendMessage(SendMessage),
    MarkMessageRead(MessageRef),
    TypingStart(ChatRef),
    TypingStop(ChatRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
    pub chat_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub message_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub chat_id: Uuid,
    #[serde(default)]
    pub content: String,
    pub temp_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        message: &'static str,
        user_id: Uuid,
    },
    JoinedChat {
        chat_id: Uuid,
        other_user: Profile,
        conversation_type: &'static str,
    },
    LeftChat {
        chat_id: Uuid,
    },
    ConversationPartnerOnline {
        user_id: Uuid,
        user_name: String,
        avatar: Option<String>,
    },
    ConversationPartnerOffline {
        user_id: Uuid,
        user_name: String,
    },
    NewMessage(NewMessage),
    NewMessageNotification(Notification),
    MessageRead(ReadReceipt),
    UserTyping {
        user_id: Uuid,
        user_name: String,
        chat_id: Uuid,
    },
    UserStoppedTyping {
        user_id: Uuid,
        chat_id: Uuid,
    },
    Error {
        message: String,
    },
    MessageError {
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        error: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> ServerEvent {
        ServerEvent::Error { message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
}

/// What a message carries besides its text. Media only ever rides on images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image { media: Vec<MediaRef> },
}

impl MessageKind {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageKind::Text => MessageType::Text,
            MessageKind::Image { .. } => MessageType::Image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub id: Uuid,
    pub url: String,
    pub message_id: Uuid,
}

impl From<&Media> for MediaRef {
    fn from(media: &Media) -> Self {
        MediaRef {
            id: media.id,
            url: media.url.clone(),
            message_id: media.message_id,
        }
    }
}

/// The single `new_message` shape, whichever path created the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub chat_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    pub sender: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    #[serde(flatten)]
    pub kind: MessageKind,
}

impl NewMessage {
    pub fn new(message: Message, sender: Profile, kind: MessageKind, temp_id: Option<String>) -> NewMessage {
        NewMessage {
            id: message.id,
            content: message.content,
            sender_id: message.sender_id,
            chat_id: message.chat_id,
            sent_at: message.sent_at,
            delivered_at: message.delivered_at,
            read_at: message.read_at,
            sender,
            temp_id,
            kind,
        }
    }

    pub fn notification(&self) -> Notification {
        let preview = match &self.kind {
            MessageKind::Text => preview(&self.content),
            MessageKind::Image { media } => {
                let count = media.len().max(1);
                format!("📷 Sent {count} image{}", if count > 1 { "s" } else { "" })
            }
        };

        Notification {
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            sender_name: self.sender.name.clone(),
            sender_avatar: self.sender.avatar.clone(),
            preview,
            timestamp: self.sent_at,
            kind: self.kind.message_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub preview: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "type")]
    pub kind: MessageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: Uuid,
    pub read_by: Uuid,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        head + "..."
    } else {
        head
    }
}
