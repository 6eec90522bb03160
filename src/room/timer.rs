//! Round countdown and forced play
//!
//! One timer task per round, stored on the room so the next round (or a
//! reset) can abort it. Pause does not stop the ticking; a paused tick
//! simply neither decrements nor broadcasts, which is what makes the
//! countdown resume from the same value.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{machine, Room, RoomState};
use crate::protocol::ServerMessage;
use crate::types::*;

pub fn spawn_round_timer(room: Arc<Room>, epoch: u64, seconds: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut remaining = seconds;
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick of a tokio interval fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let mut guard = room.state.lock().await;
            let state = &mut *guard;

            // A new round or reset happened while we slept
            if state.round_epoch != epoch || state.phase != GamePhase::Playing {
                break;
            }
            if state.paused {
                continue;
            }

            remaining -= 1;
            room.broadcast(ServerMessage::TimerUpdate {
                seconds_remaining: remaining,
            });

            if remaining == 0 {
                tracing::info!("Room {}: round timer expired", room.code);
                force_play_laggards(&room, state);
                machine::check_completion(&room, state);
                break;
            }
        }
    })
}

/// Auto-submit for every non-judge player who has not acted: the first
/// `pick` cards of their hand, in hand order. Wildcards become the fixed
/// lateness text since nobody is around to author them.
pub(crate) fn force_play_laggards(room: &Arc<Room>, state: &mut RoomState) {
    let pick = match &state.prompt {
        Some(p) => p.pick as usize,
        None => return,
    };

    let laggards: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|p| {
            !state.is_judge(&p.id) && !state.has_submitted(&p.id) && p.hand.len() >= pick
        })
        .map(|p| p.id.clone())
        .collect();

    for player_id in laggards {
        let Some(player) = state.player_mut(&player_id) else {
            continue;
        };
        let originals: Vec<String> = player.hand.drain(..pick).collect();
        let new_hand = player.hand.clone();
        let texts: Vec<String> = originals
            .iter()
            .map(|c| {
                if c == WILDCARD_TEXT {
                    FORCED_WILDCARD_TEXT.to_string()
                } else {
                    c.clone()
                }
            })
            .collect();

        tracing::info!("Room {}: force-playing for {}", room.code, player_id);
        state.unicast(
            &player_id,
            ServerMessage::ForcePlayed {
                played_texts: texts.clone(),
                hand: new_hand,
            },
        );
        state.submissions.push(Submission {
            player_id,
            texts,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::CardLibrary;
    use crate::room::{machine, session, RoomRegistry};
    use tokio::sync::mpsc;

    async fn three_player_room() -> (Arc<Room>, PlayerId, PlayerId, PlayerId) {
        let registry = RoomRegistry::new(CardLibrary::builtin());
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (room, alice) = registry.create_room("Alice".to_string(), tx_a).await;
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let bob = session::join_room(&registry, &room.code, "Bob".to_string(), tx_b)
            .await
            .unwrap()
            .1;
        let (tx_c, _rx_c) = mpsc::unbounded_channel();
        let carol = session::join_room(&registry, &room.code, "Carol".to_string(), tx_c)
            .await
            .unwrap()
            .1;
        room.state.lock().await.settings.timer_seconds = 0;
        (room, alice, bob, carol)
    }

    #[tokio::test]
    async fn forced_play_takes_front_of_hand() {
        let (room, alice, bob, carol) = three_player_room().await;
        machine::start_game(&room, &alice).await.unwrap();

        let (pick, front) = {
            let state = room.state.lock().await;
            let pick = state.prompt.as_ref().unwrap().pick as usize;
            let front: Vec<String> = state.player(&bob).unwrap().hand[..pick].to_vec();
            (pick, front)
        };

        {
            let mut guard = room.state.lock().await;
            force_play_laggards(&room, &mut guard);
        }

        let state = room.state.lock().await;
        // Both non-judge players were swept, deterministically from the
        // front of their hands
        assert_eq!(state.submissions.len(), 2);
        let bob_sub = state
            .submissions
            .iter()
            .find(|s| s.player_id == bob)
            .unwrap();
        let expected: Vec<String> = front
            .iter()
            .map(|c| {
                if c == WILDCARD_TEXT {
                    FORCED_WILDCARD_TEXT.to_string()
                } else {
                    c.clone()
                }
            })
            .collect();
        assert_eq!(bob_sub.texts, expected);
        assert_eq!(state.player(&bob).unwrap().hand.len(), HAND_SIZE - pick);
        assert_eq!(state.player(&carol).unwrap().hand.len(), HAND_SIZE - pick);
        // The judge was not touched
        assert!(!state.submissions.iter().any(|s| s.player_id == alice));
    }

    #[tokio::test]
    async fn forced_play_skips_players_who_submitted() {
        let (room, alice, bob, _carol) = three_player_room().await;
        machine::start_game(&room, &alice).await.unwrap();

        let (texts, originals) = {
            let state = room.state.lock().await;
            let pick = state.prompt.as_ref().unwrap().pick as usize;
            let cards: Vec<String> = state
                .player(&bob)
                .unwrap()
                .hand
                .iter()
                .filter(|c| *c != WILDCARD_TEXT)
                .take(pick)
                .cloned()
                .collect();
            (cards.clone(), cards)
        };
        machine::submit_cards(&room, &bob, texts.clone(), originals)
            .await
            .unwrap();

        {
            let mut guard = room.state.lock().await;
            force_play_laggards(&room, &mut guard);
        }

        let state = room.state.lock().await;
        let bob_subs: Vec<_> = state
            .submissions
            .iter()
            .filter(|s| s.player_id == bob)
            .collect();
        assert_eq!(bob_subs.len(), 1);
        assert_eq!(bob_subs[0].texts, texts);
    }

    #[tokio::test]
    async fn forced_play_substitutes_wildcards() {
        let (room, alice, bob, _carol) = three_player_room().await;
        machine::start_game(&room, &alice).await.unwrap();
        {
            let mut state = room.state.lock().await;
            state.prompt = Some(PromptCard {
                text: "____.".to_string(),
                pick: 1,
            });
            state.player_mut(&bob).unwrap().hand[0] = WILDCARD_TEXT.to_string();
        }

        {
            let mut guard = room.state.lock().await;
            force_play_laggards(&room, &mut guard);
        }

        let state = room.state.lock().await;
        let bob_sub = state
            .submissions
            .iter()
            .find(|s| s.player_id == bob)
            .unwrap();
        assert_eq!(bob_sub.texts, vec![FORCED_WILDCARD_TEXT.to_string()]);
    }

    #[tokio::test]
    async fn stale_timer_does_not_fire_into_a_new_round() {
        let (room, alice, _bob, _carol) = three_player_room().await;
        machine::start_game(&room, &alice).await.unwrap();

        // Spawn a timer for an epoch that is already over
        let stale_epoch = room.state.lock().await.round_epoch - 1;
        let handle = spawn_round_timer(room.clone(), stale_epoch, 1);
        let _ = tokio::time::timeout(Duration::from_secs(3), handle).await;

        // Nothing was force-played by the stale task
        let state = room.state.lock().await;
        assert!(state.submissions.is_empty());
        assert_eq!(state.phase, GamePhase::Playing);
    }
}
