//! Client connection handling

use super::registry::SessionRegistry;
use crate::protocol::{create_error_message, parse_client_message, serialize, ServerMessage};
use anyhow::{anyhow, Result};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// How long a closing connection may spend flushing queued messages
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a connected client's outbound queue
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// Unique client identifier
    id: Uuid,

    /// Channel to send messages to this client
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientConnection {
    /// Create a new client connection
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Get client ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a message for the client
    ///
    /// Never blocks, so it is safe to call while holding a session lock.
    pub fn send(&self, msg: ServerMessage) -> Result<()> {
        self.sender
            .send(msg)
            .map_err(|_| anyhow!("Client {} is no longer receiving", self.id))
    }
}

/// Task to write outgoing messages to the client
///
/// Runs until every sender for the queue is dropped, then closes the sink.
pub async fn client_writer_task<W>(mut sink: W, mut receiver: mpsc::UnboundedReceiver<ServerMessage>)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(msg) = receiver.recv().await {
        match serialize(&msg) {
            Ok(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::error!("Failed to write message to client: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
            }
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!("Failed to close client sink: {}", e);
    }

    tracing::debug!("Client writer task finished");
}

/// Drive one client from join to cleanup
///
/// `sink` and `stream` are the two halves of the client's socket. The connection is
/// closed on every exit path.
pub async fn handle_connection<W, R, E>(
    sink: W,
    mut stream: R,
    game_id: String,
    registry: Arc<SessionRegistry>,
    idle_timeout: Option<Duration>,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();
    let client = ClientConnection::new(tx);
    let client_id = client.id();

    tracing::info!("Client {} joining session '{}'", client_id, game_id);

    let (session, symbol) = match registry.join(&game_id, &client).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::info!("Rejecting client {} from '{}': {}", client_id, game_id, e);
            reject(sink, create_error_message(e.to_string())).await;
            return;
        }
    };

    tracing::info!("Client {} plays {} in '{}'", client_id, symbol, game_id);

    let mut writer_handle = tokio::spawn(client_writer_task(sink, rx));

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::info!("Client {} idle for {:?}, dropping", client_id, limit);
                    break;
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => match parse_client_message(&text) {
                Ok(msg) => session.handle_message(symbol, msg).await,
                Err(e) => tracing::debug!("Ignoring message from {}: {}", client_id, e),
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("Client disconnected: {}", client_id);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::info!("Error reading from client {}: {}", client_id, e);
                break;
            }
        }
    }

    registry.leave(&session, client_id).await;

    // Last sender gone: the writer flushes and closes the socket
    drop(client);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_handle)
        .await
        .is_err()
    {
        tracing::warn!("Writer for {} did not finish, aborting", client_id);
        writer_handle.abort();
    }

    tracing::info!("Client handler finished: {}", client_id);
}

/// Send a single error payload and close
async fn reject<W>(mut sink: W, msg: ServerMessage)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match serialize(&msg) {
        Ok(text) => {
            if let Err(e) = sink.send(Message::Text(text)).await {
                tracing::warn!("Failed to send rejection: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to serialize rejection: {}", e),
    }

    if let Err(e) = sink.close().await {
        tracing::debug!("Failed to close rejected client: {}", e);
    }
}
