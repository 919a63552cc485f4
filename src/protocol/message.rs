//! Message types for the game protocol

use crate::game::{Board, Score, Symbol};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Place the sender's mark; coordinates are range-checked by the session
    MakeMove { row: i64, col: i64 },

    /// Vote to start another round
    RematchRequest,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Game event notification
    Event(GameEvent),

    /// Protocol-level rejection, sent without an `event` field
    Error { error: String },
}

/// Game state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// Tells a newly attached client which mark it plays
    PlayerAssignment { player: Symbol },

    /// Both seats are filled
    StartGame { current_player: Symbol, score: Score },

    /// A non-terminal move was played
    Move { board: Board, current_player: Symbol },

    /// The last move completed a line
    Win {
        player: Symbol,
        board: Board,
        score: Score,
    },

    /// The board filled up without a line
    Draw { board: Board },

    /// Both players voted for a rematch
    NewGame {
        board: Board,
        current_player: Symbol,
        score: Score,
    },

    /// The other player disconnected
    OpponentLeft,
}

impl From<GameEvent> for ServerMessage {
    fn from(event: GameEvent) -> Self {
        ServerMessage::Event(event)
    }
}
