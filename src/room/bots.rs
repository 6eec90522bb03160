//! Bot players
//!
//! Bots are ordinary `Player` entries with `is_bot` set. Their scheduled
//! actions go through `machine::record_submission` and
//! `machine::resolve_vote`, the same entry points human connections use,
//! so they cannot corrupt an invariant a human could not. Scheduled
//! callbacks are not cancelled; they re-check phase, epoch, and pause at
//! fire time and no-op when the round they were scheduled for is gone.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use super::{machine, Room, RoomError, RoomState};
use crate::protocol::ServerMessage;
use crate::types::*;

/// Seconds a bot ponders before playing its cards.
const BOT_PLAY_DELAY_SECS: RangeInclusive<u64> = 2..=8;
/// Seconds a bot judge deliberates before voting.
const BOT_JUDGE_DELAY_SECS: RangeInclusive<u64> = 12..=18;

fn bot_name(state: &RoomState) -> String {
    loop {
        let name = format!(
            "Bot {}",
            petname::petname(2, " ").unwrap_or_else(|| "incognito".to_string())
        );
        if !state.players.iter().any(|p| p.name == name) {
            return name;
        }
    }
}

/// Host-only `add_bot`. A bot added mid-game gets a full hand right away
/// and, if a round is collecting, takes its turn like anyone else.
pub async fn add_bot(room: &Arc<Room>, caller: &str) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }

    let mut bot = Player::new_bot(bot_name(state));
    if state.phase != GamePhase::Lobby {
        state.response_deck.ensure(HAND_SIZE);
        bot.hand = state.response_deck.draw_up_to(HAND_SIZE);
    }
    let bot_id = bot.id.clone();
    tracing::info!("Room {}: bot {} added", room.code, bot.name);
    state.players.push(bot);

    room.broadcast(ServerMessage::UpdatePlayers {
        players: state.player_infos(),
    });

    if state.phase == GamePhase::Playing {
        spawn_bot_play(room, &bot_id, state.round_epoch);
    }
    Ok(())
}

/// Host-only `remove_bot`: evict the most recently added bot that is not
/// currently judging. Its pending submission, if any, goes with it, and
/// the completion check re-runs since the bar may have dropped.
pub async fn remove_bot(room: &Arc<Room>, caller: &str) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }

    let idx = state
        .players
        .iter()
        .rposition(|p| p.is_bot && !state.is_judge(&p.id))
        .ok_or(RoomError::NoRemovableBot)?;
    let bot = state.players.remove(idx);
    state.submissions.retain(|s| s.player_id != bot.id);
    tracing::info!("Room {}: bot {} removed", room.code, bot.name);

    room.broadcast(ServerMessage::UpdatePlayers {
        players: state.player_infos(),
    });
    machine::check_completion(room, state);
    Ok(())
}

/// Schedule one delayed play per non-judge bot. Called at round start,
/// under the room lock.
pub(crate) fn schedule_round_bots(room: &Arc<Room>, state: &RoomState) {
    let epoch = state.round_epoch;
    for bot in state.players.iter().filter(|p| p.is_bot) {
        if !state.is_judge(&bot.id) {
            spawn_bot_play(room, &bot.id, epoch);
        }
    }
}

fn spawn_bot_play(room: &Arc<Room>, bot_id: &str, epoch: u64) {
    let delay = rand::rng().random_range(BOT_PLAY_DELAY_SECS);
    let room = room.clone();
    let bot_id = bot_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(delay)).await;
        bot_take_turn(&room, &bot_id, epoch).await;
    });
}

/// The delayed body of a bot's turn. All guards re-checked at fire time;
/// a stale callback quietly does nothing.
pub(crate) async fn bot_take_turn(room: &Arc<Room>, bot_id: &str, epoch: u64) {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;

    if state.round_epoch != epoch || state.phase != GamePhase::Playing || state.paused {
        return;
    }
    let Some(bot) = state.player(bot_id) else {
        return;
    };
    if !bot.is_bot || state.is_judge(bot_id) || state.has_submitted(bot_id) {
        return;
    }
    let pick = match &state.prompt {
        Some(p) => p.pick as usize,
        None => return,
    };

    // Bots have no wit of their own: they skip wildcards and let the
    // timer force-play if the hand is all jokers
    let mut cards: Vec<String> = bot
        .hand
        .iter()
        .filter(|c| *c != WILDCARD_TEXT)
        .cloned()
        .collect();
    if cards.len() < pick {
        return;
    }
    cards.shuffle(&mut rand::rng());
    cards.truncate(pick);

    if let Err(e) = machine::record_submission(room, state, bot_id, cards.clone(), cards) {
        tracing::debug!("Room {}: bot {} play skipped: {}", room.code, bot_id, e);
    }
}

/// Schedule the bot judge's delayed vote. Called at the JUDGING
/// transition, under the room lock.
pub(crate) fn schedule_bot_judge(room: &Arc<Room>, state: &RoomState) {
    let epoch = state.round_epoch;
    let delay = rand::rng().random_range(BOT_JUDGE_DELAY_SECS);
    let room = room.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(delay)).await;
        bot_judge_vote(&room, epoch).await;
    });
}

/// The delayed body of a bot judge's vote: a uniformly random submission,
/// resolved through the same path a human vote takes.
pub(crate) async fn bot_judge_vote(room: &Arc<Room>, epoch: u64) {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;

    if state.round_epoch != epoch
        || state.phase != GamePhase::Judging
        || state.pending_judge.is_some()
        || state.paused
    {
        return;
    }
    let Some(judge_id) = state.judge_id.clone() else {
        return;
    };
    if !state.player(&judge_id).is_some_and(|p| p.is_bot) {
        return;
    }
    let Some(lead) = state
        .submissions
        .choose(&mut rand::rng())
        .and_then(|s| s.texts.first())
        .cloned()
    else {
        return;
    };

    if let Err(e) = machine::resolve_vote(room, state, &judge_id, &lead) {
        tracing::debug!("Room {}: bot judge vote skipped: {}", room.code, e);
    }
}
