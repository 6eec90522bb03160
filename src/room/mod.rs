pub mod bots;
pub mod machine;
pub mod session;
pub mod timer;

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::deck::Deck;
use crate::library::CardLibrary;
use crate::protocol::{PlayerInfo, ServerMessage};
use crate::types::*;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

/// Generate a random room code (5 characters)
fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
    #[error("that name is already taken")]
    NameTaken,
    #[error("only the host can do that")]
    NotHost,
    #[error("that action is not valid right now")]
    WrongPhase,
    #[error("player not found")]
    PlayerNotFound,
    #[error("submission must contain exactly {expected} cards")]
    WrongPickCount { expected: u32 },
    #[error("you already submitted this round")]
    AlreadySubmitted,
    #[error("the judge does not submit cards")]
    JudgeCannotSubmit,
    #[error("played card is not in your hand")]
    CardNotInHand,
    #[error("only the judge can vote")]
    NotJudge,
    #[error("no submission matches that card")]
    NoSuchSubmission,
    #[error("need at least two players to start")]
    NotEnoughPlayers,
    #[error("no removable bot in the room")]
    NoRemovableBot,
    #[error("you are not in that room")]
    NotInRoom,
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl RoomError {
    /// Stable machine-readable code for the wire `Error` message.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound => "ROOM_NOT_FOUND",
            RoomError::NameTaken => "NAME_TAKEN",
            RoomError::NotHost => "NOT_HOST",
            RoomError::WrongPhase => "WRONG_PHASE",
            RoomError::PlayerNotFound => "PLAYER_NOT_FOUND",
            RoomError::WrongPickCount { .. } => "WRONG_PICK_COUNT",
            RoomError::AlreadySubmitted => "ALREADY_SUBMITTED",
            RoomError::JudgeCannotSubmit => "JUDGE_CANNOT_SUBMIT",
            RoomError::CardNotInHand => "CARD_NOT_IN_HAND",
            RoomError::NotJudge => "NOT_JUDGE",
            RoomError::NoSuchSubmission => "NO_SUCH_SUBMISSION",
            RoomError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            RoomError::NoRemovableBot => "NO_REMOVABLE_BOT",
            RoomError::NotInRoom => "NOT_IN_ROOM",
            RoomError::InvalidSettings(_) => "INVALID_SETTINGS",
        }
    }
}

/// All mutable game data for one room. Guarded by the room's single
/// mutex, so every handler sees a consistent state from lock to unlock.
#[derive(Debug)]
pub struct RoomState {
    pub phase: GamePhase,
    /// Insertion order is seating order; the first player is the initial
    /// judge.
    pub players: Vec<Player>,
    pub prompt: Option<PromptCard>,
    pub judge_id: Option<PlayerId>,
    pub submissions: Vec<Submission>,
    pub prompt_deck: Deck<PromptCard>,
    pub response_deck: Deck<String>,
    pub settings: RoomSettings,
    pub paused: bool,
    /// Last round's winner, waiting to judge the next round. Set between
    /// `round_winner` and `trigger_next_round`.
    pub pending_judge: Option<PlayerId>,
    /// The one live countdown for this room, if any. Aborted before any
    /// new round or reset so a stale tick can never fire into fresh state.
    pub timer: Option<JoinHandle<()>>,
    /// Bumped on every round start and reset; timer ticks and bot
    /// callbacks compare it at fire time and no-op when stale.
    pub round_epoch: u64,
}

impl RoomState {
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.player(player_id).is_some_and(|p| p.is_host)
    }

    pub fn is_judge(&self, player_id: &str) -> bool {
        self.judge_id.as_deref() == Some(player_id)
    }

    pub fn non_judge_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| self.judge_id.as_deref() != Some(p.id.as_str()))
            .count()
    }

    pub fn has_submitted(&self, player_id: &str) -> bool {
        self.submissions.iter().any(|s| s.player_id == player_id)
    }

    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(PlayerInfo::from).collect()
    }

    /// Send to one player's live connection; silently dropped if they are
    /// a bot or currently disconnected.
    pub fn unicast(&self, player_id: &str, msg: ServerMessage) {
        if let Some(tx) = self.player(player_id).and_then(|p| p.conn.as_ref()) {
            let _ = tx.send(msg);
        }
    }

    /// Cancel the live countdown, if any. Returns whether one was running.
    pub fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

/// One isolated game session. All mutation goes through `state`'s lock;
/// `events` fans out to every connection subscribed to this room.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub created_at: String,
    pub library: Arc<CardLibrary>,
    pub state: Mutex<RoomState>,
    pub events: broadcast::Sender<ServerMessage>,
}

impl Room {
    pub fn broadcast(&self, msg: ServerMessage) {
        // No receivers is fine (everyone may be disconnected)
        let _ = self.events.send(msg);
    }
}

/// Owns the code → room mapping. Injected wherever rooms are needed; there
/// is no ambient registry.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, Arc<Room>>>,
    library: Arc<CardLibrary>,
}

impl RoomRegistry {
    pub fn new(library: CardLibrary) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            library: Arc::new(library),
        }
    }

    /// Create a room with the caller as host. Returns the room and the
    /// host's player id.
    pub async fn create_room(&self, host_name: String, conn: PlayerTx) -> (Arc<Room>, PlayerId) {
        let settings = RoomSettings::default();
        let (prompts, responses) = self.library.snapshot(&settings.active_packs);

        let host = Player::new(host_name, true, Some(conn));
        let host_id = host.id.clone();

        let (events, _) = broadcast::channel(256);
        let state = RoomState {
            phase: GamePhase::Lobby,
            players: vec![host],
            prompt: None,
            judge_id: None,
            submissions: Vec::new(),
            prompt_deck: Deck::new(prompts),
            response_deck: Deck::new(responses),
            settings,
            paused: false,
            pending_judge: None,
            timer: None,
            round_epoch: 0,
        };

        let mut rooms = self.rooms.write().await;
        // Regenerate on collision; live-room codes must be unique
        let code = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let room = Arc::new(Room {
            code: code.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            library: self.library.clone(),
            state: Mutex::new(state),
            events,
        });
        rooms.insert(code.clone(), room.clone());

        tracing::info!("Room {} created, host {}", code, host_id);
        (room, host_id)
    }

    /// Look up a room, case-insensitively.
    pub async fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(&code.to_uppercase()).cloned()
    }

    pub async fn remove(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(&code.to_uppercase())
    }

    pub fn library(&self) -> &CardLibrary {
        &self.library
    }
}
