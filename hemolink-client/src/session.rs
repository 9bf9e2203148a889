//! Authentication contract consumed from the external auth service.
//!
//! The auth service owns login and token issuance; this crate only observes
//! the current [`Session`] through a watch channel.

use std::{fmt, sync::Arc};

use shared::models::UserId;
use tokio::sync::watch;

/// An authenticated user together with the bearer token for REST calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    token: String,
}

impl Session {
    pub fn new(user_id: impl Into<UserId>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Shared, observable authentication state.
///
/// `None` means logged out. Cloning yields another handle on the same state.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionWatch {
    /// Starts logged out.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn authenticated(session: Session) -> Self {
        let watch = Self::new();
        watch.sign_in(session);
        watch
    }

    pub fn sign_in(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
