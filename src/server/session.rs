//! Session management - one game's authoritative state and its lock

use super::connection::ClientConnection;
use crate::game::{check_draw, check_win, Board, Position, Score, Symbol};
use crate::protocol::{ClientMessage, GameEvent, ServerMessage, GAME_FULL_MESSAGE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Seats per session
pub const MAX_PLAYERS: usize = 2;

/// Reasons an attach attempt is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    /// Both seats are taken
    #[error("{}", GAME_FULL_MESSAGE)]
    GameFull,

    /// The session emptied and left the registry while the caller waited for its lock
    #[error("Session '{0}' is closed")]
    Retired(String),
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Client-supplied identifier
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Symbols of attached players, in join order
    pub players: Vec<Symbol>,

    pub board: Board,
    pub current_turn: Symbol,
    pub score: Score,

    /// A win or draw ended the round and no rematch has started yet
    pub round_over: bool,
}

/// A client attached to a session
pub struct Player {
    symbol: Symbol,
    connection: ClientConnection,
}

impl Player {
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection.id()
    }
}

/// Mutable game state guarded by the session lock
pub struct GameState {
    board: Board,
    players: Vec<Player>,
    current_turn: Symbol,
    score: Score,
    rematch_requests: HashSet<Symbol>,
    round_starter: Symbol,
    round_over: bool,
    retired: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Fresh state: empty board, X to move, no players
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            players: Vec::with_capacity(MAX_PLAYERS),
            current_turn: Symbol::X,
            score: Score::default(),
            rematch_requests: HashSet::new(),
            round_starter: Symbol::X,
            round_over: false,
            retired: false,
        }
    }

    /// Seat a new player and tell them their symbol
    ///
    /// The first seat gets X; the second gets whichever symbol is free. Filling the
    /// second seat broadcasts `start_game`.
    pub fn attach(&mut self, connection: ClientConnection) -> Result<Symbol, JoinError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(JoinError::GameFull);
        }

        let symbol = match self.players.first() {
            Some(existing) => existing.symbol.opponent(),
            None => Symbol::X,
        };

        if let Err(e) = connection.send(GameEvent::PlayerAssignment { player: symbol }.into()) {
            tracing::warn!("Failed to send assignment to {}: {}", connection.id(), e);
        }
        self.players.push(Player { symbol, connection });

        if self.players.len() == MAX_PLAYERS {
            self.broadcast(GameEvent::StartGame {
                current_player: self.current_turn,
                score: self.score,
            });
        }

        Ok(symbol)
    }

    /// Remove the player owning `connection_id`, returning how many remain
    ///
    /// A remaining player is told `opponent_left` and the unfinished round is reset so a
    /// replacement starts from an empty board. The departing symbol's rematch vote goes
    /// with it.
    pub fn detach(&mut self, connection_id: Uuid) -> usize {
        let before = self.players.len();
        self.players.retain(|p| p.connection.id() != connection_id);
        if self.players.len() == before {
            return before;
        }

        if !self.players.is_empty() {
            self.reset_round(self.round_starter);
            self.broadcast(GameEvent::OpponentLeft);
        }

        self.players.len()
    }

    /// Apply a client event on behalf of `symbol`
    pub fn handle_message(&mut self, symbol: Symbol, msg: ClientMessage) {
        match msg {
            ClientMessage::MakeMove { row, col } => {
                self.handle_move(symbol, row, col);
            }
            ClientMessage::RematchRequest => {
                self.handle_rematch_request(symbol);
            }
        }
    }

    /// Play `symbol` at `(row, col)`; returns whether the move was accepted
    ///
    /// Anything illegal is ignored without a broadcast.
    pub fn handle_move(&mut self, symbol: Symbol, row: i64, col: i64) -> bool {
        if self.players.len() != MAX_PLAYERS || self.round_over || symbol != self.current_turn {
            tracing::debug!("Ignoring move by {}: not their turn or no round in progress", symbol);
            return false;
        }

        let pos = match Position::new(row, col) {
            Some(pos) if self.board.is_empty_at(pos) => pos,
            _ => {
                tracing::debug!("Ignoring move by {} to ({}, {})", symbol, row, col);
                return false;
            }
        };

        self.board = self.board.apply_move(pos, symbol);

        if check_win(&self.board, symbol) {
            self.score.record_win(symbol);
            self.round_over = true;
            self.broadcast(GameEvent::Win {
                player: symbol,
                board: self.board,
                score: self.score,
            });
        } else if check_draw(&self.board) {
            self.round_over = true;
            self.broadcast(GameEvent::Draw { board: self.board });
        } else {
            self.current_turn = symbol.opponent();
            self.broadcast(GameEvent::Move {
                board: self.board,
                current_player: self.current_turn,
            });
        }

        true
    }

    /// Record a rematch vote; returns whether it started a new round
    pub fn handle_rematch_request(&mut self, symbol: Symbol) -> bool {
        self.rematch_requests.insert(symbol);
        if self.rematch_requests.len() < MAX_PLAYERS {
            return false;
        }

        let next_starter = self.round_starter.opponent();
        self.reset_round(next_starter);
        self.broadcast(GameEvent::NewGame {
            board: self.board,
            current_player: self.current_turn,
            score: self.score,
        });
        true
    }

    fn reset_round(&mut self, starter: Symbol) {
        self.board = Board::new();
        self.round_starter = starter;
        self.current_turn = starter;
        self.rematch_requests.clear();
        self.round_over = false;
    }

    /// Queue `event` for every attached player
    ///
    /// A failed send is logged and does not affect delivery to the others.
    fn broadcast(&self, event: GameEvent) {
        let msg: ServerMessage = event.into();
        for player in &self.players {
            if let Err(e) = player.connection.send(msg.clone()) {
                tracing::warn!(
                    "Failed to broadcast to player {} ({}): {}",
                    player.symbol,
                    player.connection.id(),
                    e
                );
            }
        }
    }

    /// Mark the session closed; later attaches fail with `JoinError::Retired`
    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn current_turn(&self) -> Symbol {
        self.current_turn
    }

    pub fn round_starter(&self) -> Symbol {
        self.round_starter
    }

    pub fn is_round_over(&self) -> bool {
        self.round_over
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Symbols that have voted for a rematch this round
    pub fn rematch_votes(&self) -> &HashSet<Symbol> {
        &self.rematch_requests
    }
}

/// One game, keyed by a client-chosen identifier
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<GameState>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: Mutex::new(GameState::new()),
        }
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Acquire the session lock
    ///
    /// Every read or mutation of game state goes through this guard.
    pub async fn lock(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().await
    }

    /// Attach a connection, refusing retired sessions
    pub async fn attach(&self, connection: ClientConnection) -> Result<Symbol, JoinError> {
        let mut state = self.lock().await;
        if state.is_retired() {
            return Err(JoinError::Retired(self.id.clone()));
        }
        state.attach(connection)
    }

    /// Dispatch a decoded client event under the session lock
    pub async fn handle_message(&self, symbol: Symbol, msg: ClientMessage) {
        self.lock().await.handle_message(symbol, msg);
    }

    /// Snapshot of the current state
    pub async fn info(&self) -> SessionInfo {
        let state = self.lock().await;
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at,
            players: state.players.iter().map(Player::symbol).collect(),
            board: state.board,
            current_turn: state.current_turn,
            score: state.score,
            round_over: state.round_over,
        }
    }
}
