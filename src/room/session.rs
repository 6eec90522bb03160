//! Joining, reconnecting, and kicking
//!
//! A player's identity within a room is their display name. A join with
//! a name that belongs to a disconnected human is a reconnect: the new
//! channel is bound to the existing entry and the full room state is
//! replayed over it, so a dropped socket costs nothing but the downtime.

use std::sync::Arc;

use super::{machine, Room, RoomError, RoomRegistry, RoomState};
use crate::protocol::ServerMessage;
use crate::types::*;

/// Join `room_code` as `display_name`, or reconnect if that name already
/// belongs to a disconnected human. Returns the room and the player id
/// the caller now speaks as.
pub async fn join_room(
    registry: &RoomRegistry,
    room_code: &str,
    display_name: String,
    conn: PlayerTx,
) -> Result<(Arc<Room>, PlayerId), RoomError> {
    let room = registry.get(room_code).await.ok_or(RoomError::RoomNotFound)?;
    let mut guard = room.state.lock().await;
    let state = &mut *guard;

    if let Some(existing) = state.players.iter_mut().find(|p| p.name == display_name) {
        if existing.is_bot || existing.is_connected() {
            return Err(RoomError::NameTaken);
        }
        // Reconnect: rebind the channel, replay the room
        existing.conn = Some(conn);
        let player_id = existing.id.clone();
        tracing::info!("Room {}: {} reconnected", room.code, display_name);
        replay_state(state, &player_id);
        room.broadcast(ServerMessage::UpdatePlayers {
            players: state.player_infos(),
        });
        return Ok((room.clone(), player_id));
    }

    let mut player = Player::new(display_name.clone(), false, Some(conn));
    if state.phase != GamePhase::Lobby {
        state.response_deck.ensure(HAND_SIZE);
        player.hand = state.response_deck.draw_up_to(HAND_SIZE);
    }
    let player_id = player.id.clone();
    tracing::info!("Room {}: {} joined", room.code, display_name);
    state.players.push(player);

    replay_state(state, &player_id);
    room.broadcast(ServerMessage::UpdatePlayers {
        players: state.player_infos(),
    });
    Ok((room.clone(), player_id))
}

/// Unicast enough state for a fresh or reconnecting client to render the
/// room exactly as everyone else sees it.
fn replay_state(state: &RoomState, player_id: &str) {
    // Unicast the list too: the joiner's broadcast subscription may not
    // be wired when the join broadcast goes out
    state.unicast(
        player_id,
        ServerMessage::UpdatePlayers {
            players: state.player_infos(),
        },
    );
    state.unicast(
        player_id,
        ServerMessage::SettingsUpdated {
            settings: state.settings.clone(),
        },
    );
    state.unicast(
        player_id,
        ServerMessage::GamePausedState {
            paused: state.paused,
        },
    );
    match state.phase {
        GamePhase::Lobby => {}
        GamePhase::Playing | GamePhase::Judging | GamePhase::GameOver => {
            if let (Some(prompt), Some(judge_id)) = (&state.prompt, &state.judge_id) {
                state.unicast(
                    player_id,
                    ServerMessage::GameStarted {
                        prompt: prompt.clone(),
                        judge_id: judge_id.clone(),
                        players: state.player_infos(),
                    },
                );
            }
            if state.phase == GamePhase::Judging {
                state.unicast(
                    player_id,
                    ServerMessage::StartVoting {
                        submissions: state.submissions.iter().map(Into::into).collect(),
                    },
                );
            }
        }
    }
}

/// Mark a socket's player as disconnected. The entry stays in the room so
/// the same name can reconnect with score and hand intact.
pub async fn mark_disconnected(room: &Arc<Room>, player_id: &str) {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if let Some(player) = state.player_mut(player_id) {
        player.conn = None;
        tracing::info!("Room {}: {} disconnected", room.code, player.name);
        room.broadcast(ServerMessage::UpdatePlayers {
            players: state.player_infos(),
        });
    }
}

/// Host-only `kick_player`. The target is removed outright, with all the
/// mid-round bookkeeping that implies: their submission is dropped, the
/// host chair moves if it was theirs, and a kicked judge ends the round
/// on the spot.
pub async fn kick_player(
    room: &Arc<Room>,
    caller: &str,
    target_id: &str,
) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    let idx = state
        .players
        .iter()
        .position(|p| p.id == target_id)
        .ok_or(RoomError::PlayerNotFound)?;

    state.unicast(target_id, ServerMessage::YouAreKicked);
    let kicked = state.players.remove(idx);
    tracing::info!("Room {}: {} kicked", room.code, kicked.name);
    state.submissions.retain(|s| s.player_id != kicked.id);
    if state.pending_judge.as_deref() == Some(target_id) {
        state.pending_judge = None;
    }

    if kicked.is_host {
        // Earliest-joined remaining human inherits the room; a bot only
        // if no humans are left
        if let Some(heir) = state.players.iter_mut().find(|p| !p.is_bot) {
            heir.is_host = true;
        } else if let Some(heir) = state.players.first_mut() {
            heir.is_host = true;
        }
    }

    let was_judge = state.judge_id.as_deref() == Some(target_id);
    if was_judge && matches!(state.phase, GamePhase::Playing | GamePhase::Judging) {
        // The round cannot finish without its judge; scrap it and start
        // fresh with a new one
        if let Some(next_judge) = state.players.first().map(|p| p.id.clone()) {
            machine::begin_round(room, state, next_judge);
        } else {
            state.phase = GamePhase::Lobby;
        }
    } else {
        room.broadcast(ServerMessage::UpdatePlayers {
            players: state.player_infos(),
        });
        machine::check_completion(room, state);
    }
    Ok(())
}
