use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        display_name: String,
    },
    /// Join-or-reconnect: a known display name rebinds that player's
    /// connection instead of creating a new seat.
    JoinRoom {
        room_code: String,
        display_name: String,
    },
    StartGame {
        room_code: String,
    },
    /// `original_hand_texts` names the hand entries being spent, so a
    /// wildcard play (authored text) can be matched to its sentinel card.
    PlayCard {
        room_code: String,
        response_texts: Vec<String>,
        original_hand_texts: Vec<String>,
    },
    JudgeVote {
        room_code: String,
        winning_lead_text: String,
    },
    TriggerNextRound {
        room_code: String,
    },
    KickPlayer {
        room_code: String,
        player_id: PlayerId,
    },
    ResetGame {
        room_code: String,
    },
    UpdateSettings {
        room_code: String,
        settings: RoomSettings,
    },
    TogglePause {
        room_code: String,
    },
    AddBot {
        room_code: String,
    },
    RemoveBot {
        room_code: String,
    },
    SendChatMessage {
        room_code: String,
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unicast on a successful bind (create or join) with the room code
    /// and the player id this connection now speaks as.
    RoomCreated {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    UpdatePlayers {
        players: Vec<PlayerInfo>,
    },
    /// Unicast join failure; `code` is RoomNotFound or NameTaken.
    ErrorJoin {
        code: String,
        reason: String,
    },
    /// New round underway. Hands ride along in the player list; clients
    /// only render their own.
    GameStarted {
        prompt: PromptCard,
        judge_id: PlayerId,
        players: Vec<PlayerInfo>,
    },
    /// All submissions are in, shuffled once for the judge's table.
    StartVoting {
        submissions: Vec<SubmissionInfo>,
    },
    RoundWinner {
        winner_name: String,
        winning_texts: Vec<String>,
    },
    GameOver {
        winner_name: String,
        score: u32,
    },
    /// The prompt deck ran dry; the game cannot continue. Distinct from a
    /// win on purpose.
    DeckExhausted,
    ReturnToLobby {
        players: Vec<PlayerInfo>,
    },
    SettingsUpdated {
        settings: RoomSettings,
    },
    TimerUpdate {
        seconds_remaining: u32,
    },
    TimerStop,
    /// Unicast to a player whose cards were auto-played on timeout.
    ForcePlayed {
        played_texts: Vec<String>,
        hand: Vec<String>,
    },
    YouAreKicked,
    GamePausedState {
        paused: bool,
    },
    ReceiveChatMessage {
        author: String,
        text: String,
        ts: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Wire projection of a player (drops the connection handle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub hand: Vec<String>,
    pub is_host: bool,
    pub is_bot: bool,
    pub connected: bool,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            hand: p.hand.clone(),
            is_host: p.is_host,
            is_bot: p.is_bot,
            connected: p.is_connected(),
        }
    }
}

/// Anonymous table entry for judging. No player id so the judge can't play
/// favorites; votes are keyed by the lead text instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionInfo {
    pub texts: Vec<String>,
}

impl From<&Submission> for SubmissionInfo {
    fn from(s: &Submission) -> Self {
        Self {
            texts: s.texts.clone(),
        }
    }
}
