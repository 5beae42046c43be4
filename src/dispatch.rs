//! The only way anything reaches a client: unicast to a user's live
//! connection, or broadcast to everyone subscribed to a chat room.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::debug;
use uuid::Uuid;

use crate::{
    events::{NewMessage, ReadReceipt, ServerEvent},
    presence::{ConnId, Connection, Presence},
};

type Rooms = HashMap<Uuid, HashMap<ConnId, Connection>>;

#[derive(Default)]
pub struct Dispatcher {
    presence: Presence,
    rooms: Mutex<Rooms>,
}

/// How far a new message got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub room: usize,
    pub notified: bool,
}

impl Dispatcher {
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    fn rooms(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, chat_id: Uuid, conn: &Connection) {
        self.rooms()
            .entry(chat_id)
            .or_default()
            .insert(conn.id, conn.clone());
    }

    pub fn unsubscribe(&self, chat_id: Uuid, conn_id: ConnId) -> bool {
        let mut rooms = self.rooms();
        let Some(room) = rooms.get_mut(&chat_id) else {
            return false;
        };
        let removed = room.remove(&conn_id).is_some();
        if room.is_empty() {
            rooms.remove(&chat_id);
        }
        removed
    }

    pub fn is_subscribed(&self, chat_id: Uuid, conn_id: ConnId) -> bool {
        self.rooms()
            .get(&chat_id)
            .is_some_and(|room| room.contains_key(&conn_id))
    }

    pub fn room_size(&self, chat_id: Uuid) -> usize {
        self.rooms().get(&chat_id).map_or(0, HashMap::len)
    }

    /// Pushes to the user's registered connection. False when offline.
    pub fn unicast(&self, user_id: Uuid, event: ServerEvent) -> bool {
        match self.presence.lookup(user_id) {
            Some(conn) => conn.push(event),
            None => false,
        }
    }

    /// Pushes to every subscriber of the room except `exclude`. Returns how
    /// many connections took the event.
    pub fn broadcast(&self, chat_id: Uuid, event: ServerEvent, exclude: Option<ConnId>) -> usize {
        let targets: Vec<Connection> = match self.rooms().get(&chat_id) {
            Some(room) => room
                .values()
                .filter(|conn| Some(conn.id) != exclude)
                .cloned()
                .collect(),
            None => return 0,
        };

        targets
            .iter()
            .filter(|conn| conn.push(event.clone()))
            .count()
    }

    /// Room broadcast, then a notification for the recipient if they are
    /// online somewhere other than this room.
    pub fn deliver_message(&self, message: NewMessage, recipient_id: Uuid) -> Delivery {
        let chat_id = message.chat_id;
        let notification = message.notification();
        let room = self.broadcast(chat_id, ServerEvent::NewMessage(message), None);

        let notified = match self.presence.lookup(recipient_id) {
            Some(conn) if !self.is_subscribed(chat_id, conn.id) => {
                conn.push(ServerEvent::NewMessageNotification(notification))
            }
            _ => false,
        };

        debug!(%chat_id, %recipient_id, room, notified, "message delivered");
        Delivery { room, notified }
    }

    /// Tells the original sender their message was read, if they're online.
    pub fn deliver_receipt(&self, receipt: ReadReceipt, sender_id: Uuid) -> bool {
        self.unicast(sender_id, ServerEvent::MessageRead(receipt))
    }
}
