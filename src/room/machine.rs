//! Round/turn state machine
//!
//! Every mutation of a room's game state funnels through the functions in
//! this module, whether it originates from a human connection, a bot task,
//! or the round timer. The completion check is idempotent and re-run after
//! every mutation that could satisfy it, instead of keeping a countdown
//! counter that could drift.

use std::sync::Arc;

use rand::seq::SliceRandom;

use super::{bots, timer, Room, RoomError, RoomState};
use crate::deck::Deck;
use crate::protocol::{ServerMessage, SubmissionInfo};
use crate::types::*;

/// Host-only `start_game`: LOBBY → PLAYING with the first seated player
/// as judge. Rebuilds both decks from the library so a fresh game never
/// inherits a half-drained deck or stale pack selection.
pub async fn start_game(room: &Arc<Room>, caller: &str) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    if state.phase != GamePhase::Lobby {
        return Err(RoomError::WrongPhase);
    }
    if state.players.len() < 2 {
        return Err(RoomError::NotEnoughPlayers);
    }

    let (prompts, responses) = room.library.snapshot(&state.settings.active_packs);
    state.prompt_deck = Deck::new(prompts);
    state.response_deck = Deck::new(responses);

    let judge = state.players[0].id.clone();
    tracing::info!("Room {}: game started by {}", room.code, caller);
    begin_round(room, state, judge);
    Ok(())
}

/// Host-only `trigger_next_round`: advance from the post-win display to
/// the next round, with last round's winner judging.
pub async fn next_round(room: &Arc<Room>, caller: &str) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    let judge = state.pending_judge.take().ok_or(RoomError::WrongPhase)?;
    // Winner may have been kicked while the win was on display
    let judge = if state.player(&judge).is_some() {
        judge
    } else {
        state
            .players
            .first()
            .map(|p| p.id.clone())
            .ok_or(RoomError::NotEnoughPlayers)?
    };
    begin_round(room, state, judge);
    Ok(())
}

/// Set up and announce a new round: draw a prompt (or end the game if the
/// prompt deck is dry), seat the judge, top up every hand, restart the
/// timer, and schedule bot turns. Callers hold the room lock.
pub(crate) fn begin_round(room: &Arc<Room>, state: &mut RoomState, judge_id: PlayerId) {
    state.cancel_timer();
    state.round_epoch += 1;
    state.pending_judge = None;
    state.submissions.clear();

    let prompt = match state.prompt_deck.draw() {
        Some(p) => p,
        None => {
            state.phase = GamePhase::GameOver;
            state.prompt = None;
            tracing::info!("Room {}: prompt deck exhausted, game over", room.code);
            room.broadcast(ServerMessage::DeckExhausted);
            return;
        }
    };

    state.phase = GamePhase::Playing;
    state.judge_id = Some(judge_id.clone());
    state.prompt = Some(prompt.clone());

    let needed: usize = state
        .players
        .iter()
        .map(|p| HAND_SIZE.saturating_sub(p.hand.len()))
        .sum();
    state.response_deck.ensure(needed);
    for p in state.players.iter_mut() {
        let missing = HAND_SIZE.saturating_sub(p.hand.len());
        p.hand.extend(state.response_deck.draw_up_to(missing));
    }

    tracing::info!(
        "Room {}: round {} begins, judge {}, pick {}",
        room.code,
        state.round_epoch,
        judge_id,
        prompt.pick
    );

    room.broadcast(ServerMessage::GameStarted {
        prompt,
        judge_id,
        players: state.player_infos(),
    });
    room.broadcast(ServerMessage::UpdatePlayers {
        players: state.player_infos(),
    });

    if state.settings.timer_seconds > 0 {
        room.broadcast(ServerMessage::TimerUpdate {
            seconds_remaining: state.settings.timer_seconds,
        });
        state.timer = Some(timer::spawn_round_timer(
            room.clone(),
            state.round_epoch,
            state.settings.timer_seconds,
        ));
    } else {
        room.broadcast(ServerMessage::TimerStop);
    }

    bots::schedule_round_bots(room, state);
}

/// `play_card` from a live connection.
pub async fn submit_cards(
    room: &Arc<Room>,
    player_id: &str,
    texts: Vec<String>,
    original_hand_texts: Vec<String>,
) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    record_submission(room, &mut guard, player_id, texts, original_hand_texts)
}

/// The single submission entry point, shared by humans, bots, and the
/// forced-play sweep. Validates everything before touching state, so a
/// rejected submission leaves the room exactly as it was.
pub(crate) fn record_submission(
    room: &Arc<Room>,
    state: &mut RoomState,
    player_id: &str,
    texts: Vec<String>,
    original_hand_texts: Vec<String>,
) -> Result<(), RoomError> {
    if state.phase != GamePhase::Playing {
        return Err(RoomError::WrongPhase);
    }
    if state.is_judge(player_id) {
        return Err(RoomError::JudgeCannotSubmit);
    }
    if state.has_submitted(player_id) {
        return Err(RoomError::AlreadySubmitted);
    }
    let pick = state.prompt.as_ref().map(|p| p.pick).unwrap_or(1);
    if texts.len() != pick as usize || original_hand_texts.len() != pick as usize {
        return Err(RoomError::WrongPickCount { expected: pick });
    }
    // Only wildcard slots may carry authored text; regular cards must be
    // played verbatim.
    for (text, original) in texts.iter().zip(&original_hand_texts) {
        if original != WILDCARD_TEXT && text != original {
            return Err(RoomError::CardNotInHand);
        }
    }

    let player = state
        .player_mut(player_id)
        .ok_or(RoomError::PlayerNotFound)?;
    let mut hand = player.hand.clone();
    for original in &original_hand_texts {
        match hand.iter().position(|c| c == original) {
            Some(i) => {
                hand.remove(i);
            }
            None => return Err(RoomError::CardNotInHand),
        }
    }
    player.hand = hand;

    state.submissions.push(Submission {
        player_id: player_id.to_string(),
        texts,
    });
    tracing::debug!(
        "Room {}: submission from {} ({}/{})",
        room.code,
        player_id,
        state.submissions.len(),
        state.non_judge_count()
    );

    check_completion(room, state);
    Ok(())
}

/// PLAYING → JUDGING once every non-judge player has submitted. Safe to
/// call any number of times; only the first satisfying call transitions.
pub(crate) fn check_completion(room: &Arc<Room>, state: &mut RoomState) {
    if state.phase != GamePhase::Playing {
        return;
    }
    let required = state.non_judge_count();
    if required == 0 || state.submissions.len() < required {
        return;
    }

    state.phase = GamePhase::Judging;
    if state.cancel_timer() {
        room.broadcast(ServerMessage::TimerStop);
    }
    // Shuffled once here so the judge's view stays stable afterwards
    state.submissions.shuffle(&mut rand::rng());

    tracing::info!(
        "Room {}: all {} submissions in, judging begins",
        room.code,
        required
    );
    room.broadcast(ServerMessage::StartVoting {
        submissions: state.submissions.iter().map(SubmissionInfo::from).collect(),
    });

    let judge_is_bot = state
        .judge_id
        .as_deref()
        .and_then(|id| state.player(id))
        .is_some_and(|p| p.is_bot);
    if judge_is_bot {
        bots::schedule_bot_judge(room, state);
    }
}

/// `judge_vote` from a live connection.
pub async fn cast_vote(
    room: &Arc<Room>,
    caller: &str,
    winning_lead_text: &str,
) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    resolve_vote(room, &mut guard, caller, winning_lead_text)
}

/// The single vote-resolution path, shared by human judges and bot
/// judges. Scores the winner, then either ends the game or parks the
/// winner as next round's judge until the host advances.
pub(crate) fn resolve_vote(
    room: &Arc<Room>,
    state: &mut RoomState,
    caller: &str,
    winning_lead_text: &str,
) -> Result<(), RoomError> {
    if state.phase != GamePhase::Judging || state.pending_judge.is_some() {
        return Err(RoomError::WrongPhase);
    }
    if !state.is_judge(caller) {
        return Err(RoomError::NotJudge);
    }

    let winning = state
        .submissions
        .iter()
        .find(|s| s.texts.first().map(String::as_str) == Some(winning_lead_text))
        .cloned()
        .ok_or(RoomError::NoSuchSubmission)?;

    let winner = state
        .player_mut(&winning.player_id)
        .ok_or(RoomError::PlayerNotFound)?;
    winner.score += 1;
    let winner_id = winner.id.clone();
    let winner_name = winner.name.clone();
    let score = winner.score;

    let limit = state.settings.score_limit;
    if limit > 0 && score >= limit {
        state.phase = GamePhase::GameOver;
        state.cancel_timer();
        tracing::info!(
            "Room {}: {} wins the game with {} points",
            room.code,
            winner_name,
            score
        );
        room.broadcast(ServerMessage::GameOver { winner_name, score });
    } else {
        state.pending_judge = Some(winner_id);
        tracing::info!("Room {}: {} wins the round", room.code, winner_name);
        room.broadcast(ServerMessage::RoundWinner {
            winner_name,
            winning_texts: winning.texts,
        });
    }
    room.broadcast(ServerMessage::UpdatePlayers {
        players: state.player_infos(),
    });
    Ok(())
}

/// Host-only hard reset: any state → LOBBY. Scores and hands are cleared;
/// decks are left alone because `start_game` rebuilds them anyway.
pub async fn reset(room: &Arc<Room>, caller: &str) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }

    state.cancel_timer();
    state.round_epoch += 1;
    state.phase = GamePhase::Lobby;
    state.prompt = None;
    state.judge_id = None;
    state.pending_judge = None;
    state.submissions.clear();
    state.paused = false;
    for p in state.players.iter_mut() {
        p.score = 0;
        p.hand.clear();
    }

    tracing::info!("Room {}: reset to lobby", room.code);
    room.broadcast(ServerMessage::TimerStop);
    room.broadcast(ServerMessage::GamePausedState { paused: false });
    room.broadcast(ServerMessage::ReturnToLobby {
        players: state.player_infos(),
    });
    Ok(())
}

/// Host-only settings update. Applies from the next round; the score
/// limit is consulted at vote time, so lowering it can end the game on
/// the very next vote.
pub async fn update_settings(
    room: &Arc<Room>,
    caller: &str,
    settings: RoomSettings,
) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    for id in &settings.active_packs {
        if !room.library.has_pack(id) {
            return Err(RoomError::InvalidSettings(format!("unknown pack '{id}'")));
        }
    }
    if settings.timer_seconds > 600 {
        return Err(RoomError::InvalidSettings(
            "timer may not exceed 600 seconds".to_string(),
        ));
    }

    state.settings = settings.clone();
    room.broadcast(ServerMessage::SettingsUpdated { settings });
    Ok(())
}

/// Host-only pause toggle. The timer keeps ticking underneath, but each
/// tick is a no-op while paused, so the countdown resumes where it left
/// off.
pub async fn toggle_pause(room: &Arc<Room>, caller: &str) -> Result<(), RoomError> {
    let mut guard = room.state.lock().await;
    let state = &mut *guard;
    if !state.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    state.paused = !state.paused;
    tracing::info!("Room {}: paused = {}", room.code, state.paused);
    room.broadcast(ServerMessage::GamePausedState {
        paused: state.paused,
    });
    Ok(())
}
