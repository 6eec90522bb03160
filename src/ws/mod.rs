pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{session, Room, RoomRegistry};
use crate::types::PlayerId;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<RoomRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// One connection's lifetime: unbound until a `create_room` or
/// `join_room` succeeds, then bound to a single (room, player) for the
/// rest of the socket. On close the player is marked disconnected but
/// kept, so the same name can pick the seat back up.
async fn handle_socket(socket: WebSocket, registry: Arc<RoomRegistry>) {
    let (mut sender, mut receiver) = socket.split();

    // Unicast channel: stored on the player entry, also used for
    // pre-bind replies
    let (tx, mut unicast_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut session: Option<(Arc<Room>, PlayerId)> = None;
    let mut room_rx: Option<broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            // Messages addressed to this player alone
            unicast = unicast_rx.recv() => {
                match unicast {
                    Some(msg) => {
                        if send_json(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Room-wide broadcasts, once bound
            room_msg = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => std::future::pending::<Option<ServerMessage>>().await,
                }
            } => {
                if let Some(msg) = room_msg {
                    if send_json(&mut sender, &msg).await.is_err() {
                        break;
                    }
                }
            }

            // Client frames
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let reply = dispatch(
                                    client_msg,
                                    &registry,
                                    &tx,
                                    &mut session,
                                    &mut room_rx,
                                )
                                .await;
                                if let Some(msg) = reply {
                                    if send_json(&mut sender, &msg).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Unparseable client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if send_json(&mut sender, &error).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if let Some((room, player_id)) = session {
        session::mark_disconnected(&room, &player_id).await;
    }
}

/// Route one inbound message. The binding messages are handled here
/// since they change what the socket is subscribed to; everything else
/// goes through `handlers::handle_message`.
async fn dispatch(
    msg: ClientMessage,
    registry: &Arc<RoomRegistry>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    session: &mut Option<(Arc<Room>, PlayerId)>,
    room_rx: &mut Option<broadcast::Receiver<ServerMessage>>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom { display_name } if session.is_none() => {
            let (room, player_id) = registry
                .create_room(display_name, tx.clone())
                .await;
            *room_rx = Some(room.events.subscribe());
            let reply = ServerMessage::RoomCreated {
                room_code: room.code.clone(),
                player_id: player_id.clone(),
            };
            *session = Some((room, player_id));
            Some(reply)
        }

        ClientMessage::JoinRoom {
            room_code,
            display_name,
        } if session.is_none() => {
            match session::join_room(registry, &room_code, display_name, tx.clone()).await {
                Ok((room, player_id)) => {
                    *room_rx = Some(room.events.subscribe());
                    let reply = ServerMessage::RoomCreated {
                        room_code: room.code.clone(),
                        player_id: player_id.clone(),
                    };
                    *session = Some((room, player_id));
                    Some(reply)
                }
                Err(e) => Some(ServerMessage::ErrorJoin {
                    code: e.code().to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        other => handlers::handle_message(other, session).await,
    }
}

async fn send_json(
    sender: &mut (impl SinkExt<Message> + Unpin),
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
