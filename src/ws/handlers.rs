//! WebSocket message dispatch
//!
//! Every in-room command funnels through `handle_message`: the session is
//! checked against the room code on the payload, the room module does the
//! work, and any `RoomError` comes back to the caller as a unicast
//! `Error` with a stable code.

use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{bots, machine, session, Room, RoomError};
use crate::types::PlayerId;

/// Resolve the (room, player) pair for an in-room command, verifying the
/// payload's room code matches the socket's bound room.
macro_rules! check_session {
    ($session:expr, $room_code:expr) => {
        match $session {
            Some((room, player_id)) if room.code.eq_ignore_ascii_case($room_code) => {
                (room, player_id.as_str())
            }
            _ => {
                return Some(ServerMessage::Error {
                    code: RoomError::NotInRoom.code().to_string(),
                    msg: RoomError::NotInRoom.to_string(),
                })
            }
        }
    };
}

/// Handle one in-room client message; returns a unicast reply, if any.
/// `create_room` and `join_room` are handled in the socket loop since
/// they establish the session this function requires.
pub async fn handle_message(
    msg: ClientMessage,
    session: &Option<(Arc<Room>, PlayerId)>,
) -> Option<ServerMessage> {
    let result = match &msg {
        ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } => {
            return Some(ServerMessage::Error {
                code: "ALREADY_IN_ROOM".to_string(),
                msg: "This connection is already bound to a room".to_string(),
            });
        }

        ClientMessage::StartGame { room_code } => {
            let (room, caller) = check_session!(session, room_code);
            machine::start_game(room, caller).await
        }

        ClientMessage::PlayCard {
            room_code,
            response_texts,
            original_hand_texts,
        } => {
            let (room, caller) = check_session!(session, room_code);
            machine::submit_cards(
                room,
                caller,
                response_texts.clone(),
                original_hand_texts.clone(),
            )
            .await
        }

        ClientMessage::JudgeVote {
            room_code,
            winning_lead_text,
        } => {
            let (room, caller) = check_session!(session, room_code);
            machine::cast_vote(room, caller, winning_lead_text).await
        }

        ClientMessage::TriggerNextRound { room_code } => {
            let (room, caller) = check_session!(session, room_code);
            machine::next_round(room, caller).await
        }

        ClientMessage::KickPlayer {
            room_code,
            player_id,
        } => {
            let (room, caller) = check_session!(session, room_code);
            session::kick_player(room, caller, player_id).await
        }

        ClientMessage::ResetGame { room_code } => {
            let (room, caller) = check_session!(session, room_code);
            machine::reset(room, caller).await
        }

        ClientMessage::UpdateSettings {
            room_code,
            settings,
        } => {
            let (room, caller) = check_session!(session, room_code);
            machine::update_settings(room, caller, settings.clone()).await
        }

        ClientMessage::TogglePause { room_code } => {
            let (room, caller) = check_session!(session, room_code);
            machine::toggle_pause(room, caller).await
        }

        ClientMessage::AddBot { room_code } => {
            let (room, caller) = check_session!(session, room_code);
            bots::add_bot(room, caller).await
        }

        ClientMessage::RemoveBot { room_code } => {
            let (room, caller) = check_session!(session, room_code);
            bots::remove_bot(room, caller).await
        }

        ClientMessage::SendChatMessage { room_code, text } => {
            let (room, caller) = check_session!(session, room_code);
            relay_chat(room, caller, text).await
        }
    };

    match result {
        Ok(()) => None,
        Err(e) => {
            tracing::debug!("Rejected {:?}: {}", msg, e);
            Some(ServerMessage::Error {
                code: e.code().to_string(),
                msg: e.to_string(),
            })
        }
    }
}

/// Chat is a pure relay: stamped with the sender's name and a server
/// timestamp, then fanned out to the room.
async fn relay_chat(room: &Arc<Room>, caller: &str, text: &str) -> Result<(), RoomError> {
    let author = {
        let state = room.state.lock().await;
        state
            .player(caller)
            .map(|p| p.name.clone())
            .ok_or(RoomError::PlayerNotFound)?
    };
    room.broadcast(ServerMessage::ReceiveChatMessage {
        author,
        text: text.to_string(),
        ts: chrono::Utc::now().to_rfc3339(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::CardLibrary;
    use crate::room::RoomRegistry;
    use crate::types::GamePhase;
    use tokio::sync::mpsc;

    async fn bound_session() -> (Arc<Room>, Option<(Arc<Room>, PlayerId)>, PlayerId) {
        let registry = RoomRegistry::new(CardLibrary::builtin());
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (room, alice) = registry.create_room("Alice".to_string(), tx_a).await;
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        session::join_room(&registry, &room.code, "Bob".to_string(), tx_b)
            .await
            .unwrap();
        room.state.lock().await.settings.timer_seconds = 0;
        let sess = Some((room.clone(), alice.clone()));
        (room, sess, alice)
    }

    #[tokio::test]
    async fn command_without_session_is_rejected() {
        let reply = handle_message(
            ClientMessage::StartGame {
                room_code: "ABCDE".to_string(),
            },
            &None,
        )
        .await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "NOT_IN_ROOM"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn command_for_another_room_is_rejected() {
        let (_room, sess, _alice) = bound_session().await;
        let reply = handle_message(
            ClientMessage::StartGame {
                room_code: "ZZZZZ".to_string(),
            },
            &sess,
        )
        .await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "NOT_IN_ROOM"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn start_game_through_dispatch() {
        let (room, sess, _alice) = bound_session().await;
        let reply = handle_message(
            ClientMessage::StartGame {
                room_code: room.code.clone(),
            },
            &sess,
        )
        .await;
        assert!(reply.is_none());
        assert_eq!(room.state.lock().await.phase, GamePhase::Playing);
    }

    #[tokio::test]
    async fn room_error_maps_to_coded_reply() {
        let (room, _sess, _alice) = bound_session().await;
        let bob_id = room
            .state
            .lock()
            .await
            .players
            .iter()
            .find(|p| p.name == "Bob")
            .unwrap()
            .id
            .clone();
        let bob_sess = Some((room.clone(), bob_id));

        let reply = handle_message(
            ClientMessage::StartGame {
                room_code: room.code.clone(),
            },
            &bob_sess,
        )
        .await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "NOT_HOST"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_is_broadcast_with_author() {
        let (room, sess, _alice) = bound_session().await;
        let mut rx = room.events.subscribe();
        let reply = handle_message(
            ClientMessage::SendChatMessage {
                room_code: room.code.clone(),
                text: "hi all".to_string(),
            },
            &sess,
        )
        .await;
        assert!(reply.is_none());
        match rx.try_recv() {
            Ok(ServerMessage::ReceiveChatMessage { author, text, .. }) => {
                assert_eq!(author, "Alice");
                assert_eq!(text, "hi all");
            }
            other => panic!("expected chat, got {:?}", other),
        }
    }
}
