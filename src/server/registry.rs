//! Session registry - process-wide map from game identifier to session
//!
//! Lock order is session before registry: `get_or_create` only ever takes the registry
//! lock, and `leave` takes the registry lock while still holding the emptied session's
//! lock. Nothing waits on a session lock while holding the registry lock.

use super::connection::ClientConnection;
use super::session::{GameState, JoinError, Session};
use crate::game::Symbol;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Owns every live session
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session, creating it on first reference
    ///
    /// Concurrent callers with the same id always get the same instance.
    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }

        tracing::info!("Creating session '{}'", id);
        let session = Arc::new(Session::new(id));
        sessions.insert(id.to_string(), Arc::clone(&session));
        session
    }

    /// Seat `client` in session `id`
    ///
    /// A session can be retired between lookup and attach when its last player leaves;
    /// the lookup is then repeated and finds a fresh session.
    pub async fn join(
        &self,
        id: &str,
        client: &ClientConnection,
    ) -> Result<(Arc<Session>, Symbol), JoinError> {
        loop {
            let session = self.get_or_create(id).await;
            match session.attach(client.clone()).await {
                Ok(symbol) => return Ok((session, symbol)),
                Err(JoinError::Retired(_)) => {
                    tracing::debug!("Session '{}' retired during join, retrying", id);
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Detach a client, deleting the session once nobody is left
    pub async fn leave(&self, session: &Arc<Session>, connection_id: Uuid) {
        let mut state = session.lock().await;
        let remaining = state.detach(connection_id);
        if remaining == 0 {
            self.remove_if_empty(session, &mut state).await;
        }
    }

    /// Remove `session` from the map if it is still empty
    ///
    /// Takes the session guard so no attach can slip in between the emptiness check and
    /// the removal. Only the exact instance is removed; a newer session registered under
    /// the same id is left alone.
    async fn remove_if_empty(&self, session: &Arc<Session>, state: &mut MutexGuard<'_, GameState>) {
        if state.player_count() > 0 {
            return;
        }
        state.retire();

        let mut sessions = self.sessions.lock().await;
        let same = sessions
            .get(session.id())
            .map_or(false, |current| Arc::ptr_eq(current, session));
        if same {
            sessions.remove(session.id());
            tracing::info!(
                "Removed empty session '{}' (lived {}s)",
                session.id(),
                (chrono::Utc::now() - session.created_at()).num_seconds()
            );
        }
    }

    /// Whether a session with `id` is registered
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
