//! Protocol definitions for client-server communication
//!
//! Messages travel as JSON text frames over the WebSocket.

mod message;

pub use message::{ClientMessage, GameEvent, ServerMessage};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error text sent to a client that tries to join a session with two players
pub const GAME_FULL_MESSAGE: &str = "Game is full";

/// Maximum inbound frame size; anything larger is treated as malformed
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serialize a message to JSON text
pub fn serialize<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Deserialize a message from JSON text
pub fn deserialize<'a, T: Deserialize<'a>>(text: &'a str) -> Result<T, ProtocolError> {
    serde_json::from_str(text).map_err(|e| {
        ProtocolError::MalformedMessage(format!("Failed to deserialize: {}", e))
    })
}

/// Parse an inbound client frame
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: text.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    deserialize(text)
}

/// Create an error message
pub fn create_error_message(error: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        error: error.into(),
    }
}
