//! Session context
//!
//! A single `SessionContext` is created at start-up and handed to the API
//! client and the front end. It owns the credential store and the session
//! flag; only [`SessionContext::login`] and [`SessionContext::logout`] change
//! the flag.

use crate::error::CoreResult;
use crate::storage::CredentialStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Entry point unauthenticated users are sent to
pub const LOGIN_PATH: &str = "/login";

/// Outcome of a route guard check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Granted,
    Redirect(&'static str),
}

impl RouteAccess {
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Shared authentication state
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
    state: Arc<watch::Sender<bool>>,
}

impl SessionContext {
    /// Create the session, deriving the flag from the stored access credential
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let authenticated = store.access_token().is_some();
        let (state, _) = watch::channel(authenticated);
        Self {
            store,
            state: Arc::new(state),
        }
    }

    /// The credential store backing this session
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        *self.state.borrow()
    }

    /// Watch the session flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Mark the session authenticated
    ///
    /// Credentials must already have been persisted by the login call.
    pub fn login(&self) {
        self.state.send_replace(true);
        tracing::debug!("Session marked authenticated");
    }

    /// Clear both credentials and mark the session unauthenticated
    ///
    /// The flag is cleared even when the store fails to remove a credential;
    /// the store error is returned afterwards.
    pub fn logout(&self) -> CoreResult<()> {
        self.state.send_replace(false);
        tracing::debug!("Session cleared");
        self.store.clear_credentials()
    }

    /// Check whether a protected view may be shown
    pub fn guard(&self) -> RouteAccess {
        if self.is_authenticated() {
            RouteAccess::Granted
        } else {
            RouteAccess::Redirect(LOGIN_PATH)
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::storage::{ACCESS_KEY, CredentialPair, MemoryStore, REFRESH_KEY};

    fn stored(access: &str, refresh: &str) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_credentials(&CredentialPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        }))
    }

    /// Store whose removals always fail
    struct ReadOnlyStore(MemoryStore);

    impl CredentialStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> CoreResult<()> {
            self.0.set(key, value)
        }

        fn remove(&self, _key: &str) -> CoreResult<()> {
            Err(CoreError::io_error("read-only"))
        }
    }

    #[test]
    fn flag_starts_from_stored_access_credential() {
        assert!(SessionContext::new(stored("a1", "r1")).is_authenticated());
        assert!(!SessionContext::new(Arc::new(MemoryStore::new())).is_authenticated());

        let empty_access = MemoryStore::new();
        empty_access.set(ACCESS_KEY, "").unwrap();
        assert!(!SessionContext::new(Arc::new(empty_access)).is_authenticated());
    }

    #[test]
    fn login_sets_flag_without_touching_storage() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionContext::new(store.clone());

        session.login();

        assert!(session.is_authenticated());
        assert!(store.get(ACCESS_KEY).is_none());
        assert!(store.get(REFRESH_KEY).is_none());
    }

    #[test]
    fn logout_clears_flag_and_both_credentials() {
        let store = stored("a1", "r1");
        let session = SessionContext::new(store.clone());

        session.logout().unwrap();

        assert!(!session.is_authenticated());
        assert!(store.get(ACCESS_KEY).is_none());
        assert!(store.get(REFRESH_KEY).is_none());

        // Logging out twice is harmless
        session.logout().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn logout_clears_flag_even_when_store_fails() {
        let store = ReadOnlyStore(MemoryStore::new());
        store.set(ACCESS_KEY, "a1").unwrap();
        let session = SessionContext::new(Arc::new(store));
        assert!(session.is_authenticated());

        assert!(session.logout().is_err());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn guard_redirects_to_login_when_signed_out() {
        let session = SessionContext::new(Arc::new(MemoryStore::new()));
        assert_eq!(session.guard(), RouteAccess::Redirect(LOGIN_PATH));

        session.login();
        assert!(session.guard().is_granted());
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let session = SessionContext::new(Arc::new(MemoryStore::new()));
        let mut rx = session.subscribe();

        session.login();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        let clone = session.clone();
        clone.logout().unwrap();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
        assert!(!session.is_authenticated());
    }
}
