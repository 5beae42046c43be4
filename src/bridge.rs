//! Hands facts raised by HTTP requests to the socket side. One queue, one
//! consumer, one delivery attempt per fact. Nothing is kept if the consumer
//! is gone; the rows are already persisted.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dispatch::Dispatcher,
    events::{NewMessage, ReadReceipt},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    MessageCreated {
        message: NewMessage,
        recipient_id: Uuid,
    },
    MessageRead {
        receipt: ReadReceipt,
        chat_id: Uuid,
        sender_id: Uuid,
    },
}

#[derive(Clone)]
pub struct Bridge {
    tx: mpsc::Sender<Fact>,
}

impl Bridge {
    pub fn channel(capacity: usize) -> (Bridge, mpsc::Receiver<Fact>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Bridge { tx }, rx)
    }

    /// Never waits. Returns false if the fact was dropped.
    pub fn publish(&self, fact: Fact) -> bool {
        match self.tx.try_send(fact) {
            Ok(()) => true,
            Err(TrySendError::Full(fact)) => {
                warn!(?fact, "bridge queue full, dropping fact");
                false
            }
            Err(TrySendError::Closed(fact)) => {
                warn!(?fact, "no bridge consumer attached, dropping fact");
                false
            }
        }
    }
}

/// Performs the delivery a fact calls for.
pub fn apply(hub: &Dispatcher, fact: Fact) {
    match fact {
        Fact::MessageCreated { message, recipient_id } => {
            let message_id = message.id;
            let chat_id = message.chat_id;
            let delivery = hub.deliver_message(message, recipient_id);
            info!(%message_id, %chat_id, room = delivery.room, notified = delivery.notified, "delivered message from http");
        }
        Fact::MessageRead { receipt, chat_id, sender_id } => {
            let message_id = receipt.message_id;
            let delivered = hub.deliver_receipt(receipt, sender_id);
            info!(%message_id, %chat_id, delivered, "delivered read receipt from http");
        }
    }
}

/// The bridge's single consumer. Runs until every `Bridge` handle is dropped.
pub async fn run(mut facts: mpsc::Receiver<Fact>, hub: Arc<Dispatcher>) {
    while let Some(fact) = facts.recv().await {
        apply(&hub, fact);
    }
    info!("bridge closed");
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::{events::ServerEvent, presence::Connection};

    fn read_fact(sender_id: Uuid) -> Fact {
        Fact::MessageRead {
            receipt: ReadReceipt {
                message_id: Uuid::now_v7(),
                read_by: Uuid::now_v7(),
                read_at: Some(OffsetDateTime::now_utc()),
            },
            chat_id: Uuid::now_v7(),
            sender_id,
        }
    }

    #[tokio::test]
    async fn consumer_delivers_published_facts() {
        let hub = Arc::new(Dispatcher::default());
        let (sender, mut rx) = Connection::new(Uuid::now_v7());
        hub.presence().register(sender.clone());

        let (bridge, facts) = Bridge::channel(4);
        let consumer = tokio::spawn(run(facts, hub.clone()));

        assert!(bridge.publish(read_fact(sender.user_id)));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ServerEvent::MessageRead(_)));

        drop(bridge);
        consumer.await.unwrap();
    }

    #[test]
    fn facts_are_lost_without_a_consumer() {
        let (bridge, facts) = Bridge::channel(4);
        drop(facts);
        assert!(!bridge.publish(read_fact(Uuid::now_v7())));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (bridge, _facts) = Bridge::channel(1);
        assert!(bridge.publish(read_fact(Uuid::now_v7())));
        assert!(!bridge.publish(read_fact(Uuid::now_v7())));
    }
}
