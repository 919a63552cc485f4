//! Game rules - symbols, scores and the 3x3 board engine

mod board;

pub use board::{check_draw, check_win, Board, Position, BOARD_SIZE};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A player's mark, which doubles as their turn identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The other symbol
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    /// Wire representation (`"X"` or `"O"`)
    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::X => "X",
            Symbol::O => "O",
        }
    }

    /// Parse the wire representation
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "X" => Some(Symbol::X),
            "O" => Some(Symbol::O),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounds won per symbol over a session's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "X")]
    pub x: u32,

    #[serde(rename = "O")]
    pub o: u32,
}

impl Score {
    /// Record a round won by `symbol`
    pub fn record_win(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::X => self.x += 1,
            Symbol::O => self.o += 1,
        }
    }

    /// Wins recorded for `symbol`
    pub fn wins(&self, symbol: Symbol) -> u32 {
        match symbol {
            Symbol::X => self.x,
            Symbol::O => self.o,
        }
    }
}
