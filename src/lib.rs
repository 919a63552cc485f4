//! noughts - a real-time two-player tic-tac-toe arbiter
//!
//! This crate provides the core functionality for noughts, including:
//! - The board engine (move application, win and draw detection)
//! - Game sessions and the registry that owns them
//! - The JSON message protocol spoken over WebSockets
//! - Configuration management
//!
//! # Architecture
//!
//! Each client holds one WebSocket to `/ws/{game_id}`. Two clients referencing the same
//! id share a session whose state is guarded by its own lock; every mutation is
//! broadcast to both players through per-connection outbound queues.

pub mod config;
pub mod game;
pub mod protocol;
pub mod server;
