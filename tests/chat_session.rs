mod common;

use campus_chat::{
    db,
    events::{ChatRef, ClientEvent, MessageKind, MessageRef, SendMessage, ServerEvent},
};
use common::{connect, drain, harness, user};
use uuid::Uuid;

fn join(chat_id: Uuid) -> ClientEvent {
    ClientEvent::JoinChat(ChatRef { chat_id })
}

fn send(chat_id: Uuid, content: &str, temp_id: &str) -> ClientEvent {
    ClientEvent::SendMessage(SendMessage {
        chat_id,
        content: content.to_owned(),
        temp_id: Some(temp_id.to_owned()),
    })
}

#[tokio::test]
async fn join_unknown_chat_then_created_chat() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let (mut session, mut outbox) = connect(&h.state, &alice);
    assert!(matches!(drain(&mut outbox).as_slice(), [ServerEvent::Connected { .. }]));

    session.handle(join(Uuid::now_v7())).await;
    assert_eq!(
        drain(&mut outbox),
        vec![ServerEvent::error("One-to-one conversation not found")]
    );
    assert!(session.joined().is_empty());

    let (chat, created) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();
    assert!(created);

    session.handle(join(chat.id)).await;
    assert_eq!(
        drain(&mut outbox),
        vec![ServerEvent::JoinedChat {
            chat_id: chat.id,
            other_user: bob.profile(),
            conversation_type: "one-to-one",
        }]
    );
    assert!(h.state.hub.is_subscribed(chat.id, session.connection().id));
}

#[tokio::test]
async fn pair_lookup_ignores_order() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;

    let (first, created) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();
    let (second, created_again) = db::chats::create_or_get(&h.state.db_pool, bob.id, alice.id).await.unwrap();
    assert!(created);
    assert!(!created_again);
    assert_eq!(first, second);
}

#[tokio::test]
async fn message_reaches_both_members_of_the_room() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();

    let (mut a, mut a_out) = connect(&h.state, &alice);
    let (mut b, mut b_out) = connect(&h.state, &bob);
    a.handle(join(chat.id)).await;
    b.handle(join(chat.id)).await;

    let a_events = drain(&mut a_out);
    assert!(a_events.contains(&ServerEvent::ConversationPartnerOnline {
        user_id: bob.id,
        user_name: "Bob".to_owned(),
        avatar: bob.avatar.clone(),
    }));
    drain(&mut b_out);

    a.handle(send(chat.id, "  hi  ", "t1")).await;

    for events in [drain(&mut a_out), drain(&mut b_out)] {
        let [ServerEvent::NewMessage(message)] = events.as_slice() else {
            panic!("expected a single new_message, got {events:?}");
        };
        assert_eq!(message.content, "hi");
        assert_eq!(message.temp_id.as_deref(), Some("t1"));
        assert_eq!(message.sender, alice.profile());
        assert_eq!(message.kind, MessageKind::Text);
    }

    let stored = db::messages::latest(&h.state.db_pool, chat.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "hi");
    assert_eq!(stored.sender_id, alice.id);
    let touched = db::chats::find_by_id(&h.state.db_pool, chat.id).await.unwrap().unwrap();
    // bumped in the same transaction, after the message row
    assert!(touched.updated_at >= stored.sent_at);
    assert!(stored.sent_at >= chat.updated_at);
}

#[tokio::test]
async fn member_elsewhere_gets_a_notification() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();

    let (mut a, mut a_out) = connect(&h.state, &alice);
    let (_b, mut b_out) = connect(&h.state, &bob);
    a.handle(join(chat.id)).await;
    drain(&mut a_out);
    drain(&mut b_out);

    let long = "x".repeat(80);
    a.handle(send(chat.id, &long, "t2")).await;

    assert!(matches!(drain(&mut a_out).as_slice(), [ServerEvent::NewMessage(_)]));
    let events = drain(&mut b_out);
    let [ServerEvent::NewMessageNotification(notification)] = events.as_slice() else {
        panic!("expected a single notification, got {events:?}");
    };
    assert_eq!(notification.chat_id, chat.id);
    assert_eq!(notification.sender_name, "Alice");
    assert_eq!(notification.preview, format!("{}...", "x".repeat(50)));
}

#[tokio::test]
async fn failed_sends_carry_the_temp_id() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let eve = user(&h.state.db_pool, "Eve").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();

    let (mut e, mut e_out) = connect(&h.state, &eve);
    drain(&mut e_out);

    e.handle(send(chat.id, "let me in", "t3")).await;
    assert_eq!(
        drain(&mut e_out),
        vec![ServerEvent::MessageError {
            temp_id: Some("t3".to_owned()),
            error: "You are not part of this chat".to_owned(),
        }]
    );
    assert_eq!(db::messages::count_by_chat(&h.state.db_pool, chat.id).await.unwrap(), 0);

    let (mut a, mut a_out) = connect(&h.state, &alice);
    drain(&mut a_out);
    a.handle(send(chat.id, "   ", "t4")).await;
    assert_eq!(
        drain(&mut a_out),
        vec![ServerEvent::MessageError {
            temp_id: Some("t4".to_owned()),
            error: "Message content cannot be empty".to_owned(),
        }]
    );
    assert_eq!(db::messages::count_by_chat(&h.state.db_pool, chat.id).await.unwrap(), 0);
}

#[tokio::test]
async fn outsider_cannot_join() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let eve = user(&h.state.db_pool, "Eve").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();

    let (mut a, mut a_out) = connect(&h.state, &alice);
    a.handle(join(chat.id)).await;
    drain(&mut a_out);

    let (mut e, mut e_out) = connect(&h.state, &eve);
    drain(&mut e_out);
    e.handle(join(chat.id)).await;
    assert_eq!(
        drain(&mut e_out),
        vec![ServerEvent::error("This is a private conversation between two individuals")]
    );
    assert!(!h.state.hub.is_subscribed(chat.id, e.connection().id));
    assert_eq!(h.state.hub.room_size(chat.id), 1);

    // typing for a room never joined goes nowhere
    e.handle(ClientEvent::TypingStart(ChatRef { chat_id: chat.id })).await;
    a.handle(send(chat.id, "private", "t5")).await;
    assert!(drain(&mut e_out).is_empty());
    assert!(
        drain(&mut a_out)
            .iter()
            .all(|event| !matches!(event, ServerEvent::UserTyping { .. }))
    );
}

#[tokio::test]
async fn mark_read_notifies_sender_once() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();
    let message = db::messages::create(&h.state.db_pool, chat.id, alice.id, "read me").await.unwrap();

    let (mut a, mut a_out) = connect(&h.state, &alice);
    let (mut b, mut b_out) = connect(&h.state, &bob);
    drain(&mut a_out);
    drain(&mut b_out);

    b.handle(ClientEvent::MarkMessageRead(MessageRef { message_id: message.id })).await;
    let events = drain(&mut a_out);
    let [ServerEvent::MessageRead(receipt)] = events.as_slice() else {
        panic!("expected a single message_read, got {events:?}");
    };
    assert_eq!(receipt.message_id, message.id);
    assert_eq!(receipt.read_by, bob.id);
    let first_read = receipt.read_at.unwrap();
    assert!(drain(&mut b_out).is_empty());

    b.handle(ClientEvent::MarkMessageRead(MessageRef { message_id: message.id })).await;
    let again = drain(&mut a_out);
    let [ServerEvent::MessageRead(receipt)] = again.as_slice() else {
        panic!("expected a second receipt, got {again:?}");
    };
    assert_eq!(receipt.read_at, Some(first_read));

    a.handle(ClientEvent::MarkMessageRead(MessageRef { message_id: message.id })).await;
    assert_eq!(
        drain(&mut a_out),
        vec![ServerEvent::error("Cannot mark your own message as read")]
    );
}

#[tokio::test]
async fn newest_connection_owns_presence() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let presence = h.state.hub.presence();

    let (first, mut first_out) = connect(&h.state, &alice);
    let (second, mut second_out) = connect(&h.state, &alice);
    drain(&mut first_out);
    drain(&mut second_out);

    assert_eq!(presence.lookup(alice.id).map(|conn| conn.id), Some(second.connection().id));
    assert!(h.state.hub.unicast(alice.id, ServerEvent::error("ping")));
    assert!(drain(&mut first_out).is_empty());
    assert_eq!(drain(&mut second_out).len(), 1);

    // the stale connection closing must not take the user offline
    first.close();
    assert!(presence.is_online(alice.id));

    second.close();
    assert!(!presence.is_online(alice.id));
    assert!(!h.state.hub.unicast(alice.id, ServerEvent::error("ping")));
}

#[tokio::test]
async fn disconnect_leaves_every_room() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();

    let (mut a, mut a_out) = connect(&h.state, &alice);
    let (mut b, mut b_out) = connect(&h.state, &bob);
    a.handle(join(chat.id)).await;
    b.handle(join(chat.id)).await;
    drain(&mut a_out);
    drain(&mut b_out);

    b.close();
    assert_eq!(
        drain(&mut a_out),
        vec![ServerEvent::ConversationPartnerOffline {
            user_id: bob.id,
            user_name: "Bob".to_owned(),
        }]
    );
    assert_eq!(h.state.hub.room_size(chat.id), 1);
    assert!(!h.state.hub.presence().is_online(bob.id));

    a.handle(ClientEvent::LeaveChat(ChatRef { chat_id: chat.id })).await;
    assert_eq!(drain(&mut a_out), vec![ServerEvent::LeftChat { chat_id: chat.id }]);
    assert_eq!(h.state.hub.room_size(chat.id), 0);

    a.handle(ClientEvent::LeaveChat(ChatRef { chat_id: chat.id })).await;
    assert!(drain(&mut a_out).is_empty());
}

#[tokio::test]
async fn typing_is_relayed_to_the_partner_only() {
    let h = harness().await;
    let alice = user(&h.state.db_pool, "Alice").await;
    let bob = user(&h.state.db_pool, "Bob").await;
    let (chat, _) = db::chats::create_or_get(&h.state.db_pool, alice.id, bob.id).await.unwrap();

    let (mut a, mut a_out) = connect(&h.state, &alice);
    let (mut b, mut b_out) = connect(&h.state, &bob);
    a.handle(join(chat.id)).await;
    b.handle(join(chat.id)).await;
    drain(&mut a_out);
    drain(&mut b_out);

    a.handle(ClientEvent::TypingStart(ChatRef { chat_id: chat.id })).await;
    a.handle(ClientEvent::TypingStop(ChatRef { chat_id: chat.id })).await;

    assert!(drain(&mut a_out).is_empty());
    assert_eq!(
        drain(&mut b_out),
        vec![
            ServerEvent::UserTyping {
                user_id: alice.id,
                user_name: "Alice".to_owned(),
                chat_id: chat.id,
            },
            ServerEvent::UserStoppedTyping {
                user_id: alice.id,
                chat_id: chat.id,
            },
        ]
    );
}
