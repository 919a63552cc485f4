//! Server module - session registry, WebSocket connection handling and HTTP routes

mod connection;
mod listener;
mod registry;
mod session;

pub use connection::{client_writer_task, handle_connection, ClientConnection};
pub use listener::GameServer;
pub use registry::SessionRegistry;
pub use session::{GameState, JoinError, Player, Session, SessionInfo, MAX_PLAYERS};
