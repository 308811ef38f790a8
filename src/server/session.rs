use super::auth::Credential;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type SessionId = String;

/// Generate a unique id for an SSE session
///
/// Example: 3f1c2a9e-8d4b-4c6f-9a0e-5b7d2e1f4c3a
pub fn generate_session_id() -> SessionId {
    Uuid::new_v4().to_string()
}

struct Session {
    tx: mpsc::UnboundedSender<String>,
    credential: Credential,
}

type Sessions = Arc<DashMap<SessionId, Session>>;

/// Open SSE sessions, each with the channel feeding its event stream.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Sessions,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session owned by `credential`. It stays registered while
    /// the guard is alive.
    pub fn open(
        &self,
        credential: Credential,
    ) -> (SessionGuard, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = generate_session_id();
        let authenticated = !credential.0.is_empty();
        self.sessions.insert(id.clone(), Session { tx, credential });
        tracing::info!(
            session_id = %id,
            authenticated,
            active = self.sessions.len(),
            "SSE session opened"
        );

        let guard = SessionGuard {
            id,
            sessions: self.sessions.clone(),
        };
        (guard, rx)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// True when the session exists and was opened with `credential`.
    pub fn is_owned_by(&self, id: &str, credential: &Credential) -> bool {
        self.sessions
            .get(id)
            .is_some_and(|session| session.credential == *credential)
    }

    /// Queue a message for the session's stream. False if the session is gone.
    pub fn send(&self, id: &str, message: String) -> bool {
        match self.sessions.get(id) {
            Some(session) => session.tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Removes its session from the registry on drop.
pub struct SessionGuard {
    id: SessionId,
    sessions: Sessions,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        tracing::info!(session_id = %self.id, "SSE session closed");
    }
}
