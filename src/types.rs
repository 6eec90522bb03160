use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomCode = String;

/// Every hand is replenished up to this size at the start of a round.
pub const HAND_SIZE: usize = 10;

/// Sentinel text for wildcard ("joker") response cards. Clients render these
/// as a free-text card; the authored text arrives in `play_card` while the
/// sentinel stays in `original_hand_texts`.
pub const WILDCARD_TEXT: &str = "__WILDCARD__";

/// Substituted when the round timer force-plays a wildcard the player never
/// got around to filling in.
pub const FORCED_WILDCARD_TEXT: &str = "…nothing, they ran out of time.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Lobby,
    Playing,
    Judging,
    GameOver,
}

/// The round's fill-in-the-blank card. `pick` is the number of response
/// cards each player must submit for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptCard {
    pub text: String,
    pub pick: u32,
}

/// One player's complete set of response cards for the current round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub player_id: PlayerId,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    /// First player to reach this score wins. 0 means play forever.
    pub score_limit: u32,
    /// Per-round countdown in seconds. 0 disables the timer.
    pub timer_seconds: u32,
    /// Content pack ids drawn from; empty means every pack in the library.
    pub active_packs: Vec<String>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            score_limit: 5,
            timer_seconds: 60,
            active_packs: Vec::new(),
        }
    }
}

/// Outbound channel to one player's live connection. Replaced wholesale on
/// reconnect; a closed sender is how we detect a player has dropped.
pub type PlayerTx = mpsc::UnboundedSender<ServerMessage>;

/// A seated player. Identity across reconnects is the display name; the
/// `conn` sender is the only transient part.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub hand: Vec<String>,
    pub is_host: bool,
    pub is_bot: bool,
    pub conn: Option<PlayerTx>,
}

impl Player {
    pub fn new(name: String, is_host: bool, conn: Option<PlayerTx>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name,
            score: 0,
            hand: Vec::new(),
            is_host,
            is_bot: false,
            conn,
        }
    }

    pub fn new_bot(name: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name,
            score: 0,
            hand: Vec::new(),
            is_host: false,
            is_bot: true,
            conn: None,
        }
    }

    /// Bots count as connected; humans are connected while their sender is
    /// still open.
    pub fn is_connected(&self) -> bool {
        self.is_bot || self.conn.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}
