use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::{
    AppState,
    auth::{TokenQuery, Verifier},
    db::Profile,
    dispatch::Dispatcher,
    events::ClientEvent,
    presence::Connection,
    session::Session,
};

/// Authenticates the handshake, then hands the socket to a chat session.
/// Failed handshakes never get upgraded.
#[debug_handler(state = AppState)]
pub async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(verifier): State<Arc<Verifier>>,
    State(hub): State<Arc<Dispatcher>>,
    Query(TokenQuery { token }): Query<TokenQuery>,
    headers: HeaderMap,

    ws: WebSocketUpgrade,
) -> Response {
    let user = match verifier.verify(&db_pool, &headers, token.as_deref()).await {
        Ok(user) => user,
        Err(err) => {
            warn!(error = %err, "websocket handshake rejected");
            return (err.status(), err.to_string()).into_response();
        }
    };

    let profile = user.profile();
    ws.on_upgrade(async move |socket| serve(socket, db_pool, hub, profile).await)
}

async fn serve(socket: WebSocket, db_pool: SqlitePool, hub: Arc<Dispatcher>, user: Profile) {
    let (conn, mut outbox) = Connection::new(user.id);
    let mut session = Session::open(db_pool, hub, user, conn);
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to encode server event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => session.handle(event).await,
                    Err(err) => {
                        debug!(user_id = %session.user().id, error = %err, "unreadable client event");
                        session.reject("Invalid event");
                    }
                }
            }
            _ = &mut writer => break,
        }
    }

    session.close();
    writer.abort();
}
