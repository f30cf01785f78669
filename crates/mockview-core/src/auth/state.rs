use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::User;

/// Authentication state of the application. Exactly one at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionState {
    Initializing,
    Unauthenticated,
    Authenticating,
    Authenticated(User),
    LoggingOut,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, SessionState::Initializing)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::LoggingOut => "logging_out",
        }
    }
}

/// Shared cell holding the current [`SessionState`].
///
/// The session controller and the request gateway both publish through it;
/// everything else subscribes.
#[derive(Clone)]
pub struct SessionStateHandle {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionStateHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Initializing);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Publish `next`, returning the state it replaced.
    pub fn set(&self, next: SessionState) -> SessionState {
        let to = next.name();
        let previous = self.tx.send_replace(next);
        debug!(from = previous.name(), to, "Session state transition");
        previous
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

impl Default for SessionStateHandle {
    fn default() -> Self {
        Self::new()
    }
}
