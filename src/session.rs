//! Per-connection chat protocol. A session starts connected with no rooms,
//! joins and leaves chat rooms, and is torn down by `close`.
//!
//! Events from one connection are handled one at a time, in order. Failures
//! become a single `error` or `message_error` event and never end the session.

use std::{collections::HashSet, sync::Arc};

use sqlx::SqlitePool;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    chats::access::{self, NOT_PARTICIPANT},
    db::{self, Profile},
    dispatch::Dispatcher,
    error::ChatError,
    events::{ClientEvent, MessageKind, NewMessage, SendMessage, ServerEvent},
    presence::Connection,
};

pub struct Session {
    db_pool: SqlitePool,
    hub: Arc<Dispatcher>,
    user: Profile,
    conn: Connection,
    joined: HashSet<Uuid>,
}

impl Session {
    /// Registers the connection as the user's live one and greets it.
    pub fn open(db_pool: SqlitePool, hub: Arc<Dispatcher>, user: Profile, conn: Connection) -> Session {
        hub.presence().register(conn.clone());
        conn.push(ServerEvent::Connected {
            message: "Connected successfully",
            user_id: user.id,
        });
        info!(user_id = %user.id, conn_id = %conn.id, name = %user.name, "user connected");

        Session {
            db_pool,
            hub,
            user,
            conn,
            joined: HashSet::new(),
        }
    }

    pub fn user(&self) -> &Profile {
        &self.user
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn joined(&self) -> &HashSet<Uuid> {
        &self.joined
    }

    pub async fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinChat(chat) => {
                if let Err(err) = self.join(chat.chat_id).await {
                    self.report(&err, "Failed to join conversation");
                }
            }
            ClientEvent::LeaveChat(chat) => self.leave(chat.chat_id),
            ClientEvent::SendMessage(send) => {
                let temp_id = send.temp_id.clone();
                if let Err(err) = self.send(send).await {
                    if let ChatError::Persistence(cause) = &err {
                        error!(user_id = %self.user.id, error = %cause, "failed to send message");
                    }
                    self.conn.push(ServerEvent::MessageError {
                        temp_id,
                        error: err.client_message("Failed to send message"),
                    });
                }
            }
            ClientEvent::MarkMessageRead(message) => {
                if let Err(err) = self.mark_read(message.message_id).await {
                    self.report(&err, "Failed to mark message as read");
                }
            }
            ClientEvent::TypingStart(chat) => self.typing(chat.chat_id, true),
            ClientEvent::TypingStop(chat) => self.typing(chat.chat_id, false),
        }
    }

    /// Tells this connection something went wrong outside any operation.
    pub fn reject(&self, message: impl Into<String>) {
        self.conn.push(ServerEvent::error(message));
    }

    fn report(&self, err: &ChatError, fallback: &str) {
        if let ChatError::Persistence(cause) = err {
            error!(user_id = %self.user.id, error = %cause, "{fallback}");
        } else {
            debug!(user_id = %self.user.id, error = %err, "request refused");
        }
        self.reject(err.client_message(fallback));
    }

    pub async fn join(&mut self, chat_id: Uuid) -> Result<(), ChatError> {
        let chat = access::participant_chat(
            &self.db_pool,
            chat_id,
            self.user.id,
            "One-to-one conversation not found",
            "This is a private conversation between two individuals",
        )
        .await?;

        let other_id = chat.other_participant(self.user.id);
        let other_user = db::users::find_profile(&self.db_pool, other_id)
            .await?
            .ok_or(ChatError::NotFound("Other participant not found"))?;

        self.hub.subscribe(chat_id, &self.conn);
        self.joined.insert(chat_id);

        self.conn.push(ServerEvent::JoinedChat {
            chat_id,
            other_user,
            conversation_type: "one-to-one",
        });
        self.hub.broadcast(
            chat_id,
            ServerEvent::ConversationPartnerOnline {
                user_id: self.user.id,
                user_name: self.user.name.clone(),
                avatar: self.user.avatar.clone(),
            },
            Some(self.conn.id),
        );

        info!(user_id = %self.user.id, %chat_id, %other_id, "joined conversation");
        Ok(())
    }

    /// No-op unless the room was joined.
    pub fn leave(&mut self, chat_id: Uuid) {
        if !self.joined.remove(&chat_id) {
            debug!(user_id = %self.user.id, %chat_id, "leave for a room not joined");
            return;
        }

        self.announce_offline(chat_id);
        self.hub.unsubscribe(chat_id, self.conn.id);
        self.conn.push(ServerEvent::LeftChat { chat_id });

        info!(user_id = %self.user.id, %chat_id, "left conversation");
    }

    pub async fn send(&mut self, SendMessage { chat_id, content, temp_id }: SendMessage) -> Result<(), ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation("Message content cannot be empty"));
        }

        let chat = access::participant_chat(&self.db_pool, chat_id, self.user.id, "Chat not found", NOT_PARTICIPANT)
            .await?;

        let mut tx = self.db_pool.begin().await?;
        let message = db::messages::create(&mut *tx, chat_id, self.user.id, content).await?;
        db::chats::touch(&mut *tx, chat_id).await?;
        tx.commit().await?;

        let message_id = message.id;
        let message = NewMessage::new(message, self.user.clone(), MessageKind::Text, temp_id);
        let delivery = self
            .hub
            .deliver_message(message, chat.other_participant(self.user.id));

        info!(
            user_id = %self.user.id,
            %chat_id,
            %message_id,
            room = delivery.room,
            notified = delivery.notified,
            "text message sent"
        );
        Ok(())
    }

    pub async fn mark_read(&mut self, message_id: Uuid) -> Result<(), ChatError> {
        let (message, receipt) = access::mark_read(&self.db_pool, self.user.id, message_id).await?;
        let delivered = self.hub.deliver_receipt(receipt, message.sender_id);

        info!(user_id = %self.user.id, %message_id, delivered, "message marked as read");
        Ok(())
    }

    /// Relays a typing signal to the rest of a joined room.
    pub fn typing(&self, chat_id: Uuid, started: bool) {
        if !self.joined.contains(&chat_id) {
            debug!(user_id = %self.user.id, %chat_id, "typing signal for a room not joined");
            return;
        }

        let event = if started {
            ServerEvent::UserTyping {
                user_id: self.user.id,
                user_name: self.user.name.clone(),
                chat_id,
            }
        } else {
            ServerEvent::UserStoppedTyping {
                user_id: self.user.id,
                chat_id,
            }
        };
        self.hub.broadcast(chat_id, event, Some(self.conn.id));
    }

    fn announce_offline(&self, chat_id: Uuid) {
        self.hub.broadcast(
            chat_id,
            ServerEvent::ConversationPartnerOffline {
                user_id: self.user.id,
                user_name: self.user.name.clone(),
            },
            Some(self.conn.id),
        );
    }

    /// Leaves every room and drops out of presence.
    pub fn close(mut self) {
        for chat_id in std::mem::take(&mut self.joined) {
            self.announce_offline(chat_id);
            self.hub.unsubscribe(chat_id, self.conn.id);
        }
        self.hub.presence().unregister(self.conn.id);

        info!(user_id = %self.user.id, conn_id = %self.conn.id, "user disconnected");
    }
}
