//! Auth/session signal.
//!
//! Holds the optional bearer credential whose presence decides which cart
//! (local or remote) is authoritative. The handle is constructed once and
//! injected into every collaborator; nothing reads ambient global state.
//!
//! Observers subscribe to a watch channel and see transitions eventually:
//! there is a short window where one reader still sees the old value after
//! another has updated it, and all readers must tolerate that.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::storage::{KeyValueStore, TOKEN_KEY};

/// Observable holder of the optional bearer credential.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    tx: watch::Sender<Option<SecretString>>,
    store: Arc<dyn KeyValueStore>,
}

impl SessionHandle {
    /// Restore the session from the persisted token slot.
    ///
    /// An absent or unreadable slot starts the session anonymous.
    #[must_use]
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let token = store.get(TOKEN_KEY).map(SecretString::from);
        let (tx, _rx) = watch::channel(token);
        Self {
            inner: Arc::new(SessionInner { tx, store }),
        }
    }

    /// Whether a credential is currently present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.tx.borrow().is_some()
    }

    /// Current credential, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner.tx.borrow().clone()
    }

    /// Set the credential after a successful login or signup.
    pub fn login(&self, token: SecretString) {
        if let Err(e) = self.inner.store.set(TOKEN_KEY, token.expose_secret()) {
            warn!(error = %e, "failed to persist session token");
        }
        self.inner.tx.send_replace(Some(token));
    }

    /// Clear the credential on explicit logout.
    pub fn logout(&self) {
        self.clear("logout");
    }

    /// Clear the credential after an authorization-denied response.
    pub fn clear_on_denied(&self) {
        self.clear("authorization denied");
    }

    /// Subscribe to session transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SecretString>> {
        self.inner.tx.subscribe()
    }

    fn clear(&self, reason: &str) {
        if let Err(e) = self.inner.store.remove(TOKEN_KEY) {
            warn!(error = %e, "failed to remove persisted session token");
        }
        let was_present = self.inner.tx.send_replace(None).is_some();
        if was_present {
            debug!(reason, "session cleared");
        }
    }
}
