//! Who is online, and which connection to push to.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use crate::events::ServerEvent;

pub type ConnId = Uuid;

/// Events queued for one socket before further pushes are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// Write half of one live socket. Cloning shares the same outbox.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnId,
    pub user_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

impl Connection {
    pub fn new(user_id: Uuid) -> (Connection, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (
            Connection {
                id: Uuid::now_v7(),
                user_id,
                tx,
            },
            rx,
        )
    }

    /// Queues the event for the socket writer without waiting. False once
    /// the socket is gone, or when a client that stopped reading has a full
    /// outbox.
    pub fn push(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, user_id = %self.user_id, "outbox full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Default)]
struct Maps {
    by_user: HashMap<Uuid, Connection>,
    by_conn: HashMap<ConnId, Uuid>,
}

/// Both directions sit behind one lock so they never disagree.
#[derive(Default)]
pub struct Presence {
    maps: Mutex<Maps>,
}

impl Presence {
    fn maps(&self) -> MutexGuard<'_, Maps> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last connection wins. The connection it replaces is forgotten.
    pub fn register(&self, conn: Connection) {
        let mut maps = self.maps();
        maps.by_conn.insert(conn.id, conn.user_id);
        let conn_id = conn.id;
        if let Some(previous) = maps.by_user.insert(conn.user_id, conn) {
            if previous.id != conn_id {
                maps.by_conn.remove(&previous.id);
            }
        }
    }

    /// Drops the connection's entry. A user whose newer connection took over
    /// stays online.
    pub fn unregister(&self, conn_id: ConnId) -> Option<Uuid> {
        let mut maps = self.maps();
        let user_id = maps.by_conn.remove(&conn_id)?;
        if maps.by_user.get(&user_id).is_some_and(|conn| conn.id == conn_id) {
            maps.by_user.remove(&user_id);
        }
        Some(user_id)
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<Connection> {
        self.maps().by_user.get(&user_id).cloned()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.maps().by_user.contains_key(&user_id)
    }

    pub fn count(&self) -> usize {
        self.maps().by_user.len()
    }
}
