use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::storage::SessionStorage;
use crate::models::User;

pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "token";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Snapshot of who is logged in.
///
/// Authentication is derived from `user` and `token` both being present, so a
/// half-populated session can never report itself as authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    token: Option<String>,
    hydrated: bool,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    /// `false` until persisted storage has been read at least once.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Route-guard decision for a protected view.
    pub fn access(&self) -> Access {
        match (self.hydrated, self.is_authenticated()) {
            (false, _) => Access::Pending,
            (true, true) => Access::Granted,
            (true, false) => Access::RedirectToLogin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Storage has not been read yet; render nothing session-dependent.
    Pending,
    Granted,
    RedirectToLogin,
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Owner of the current session and its persisted copy.
///
/// Cheap to clone; clones share state. Readers observe transitions through
/// [`SessionStore::subscribe`]. All mutations are serialised so the in-memory
/// state and the persisted keys never diverge.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Session>,
    write: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                state: watch::Sender::new(Session::default()),
                write: Mutex::new(()),
            }),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Resolves once [`SessionStore::hydrate`] has run.
    pub async fn wait_hydrated(&self) -> Session {
        let mut rx = self.subscribe();
        let session = match rx.wait_for(Session::is_hydrated).await {
            Ok(session) => session.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.snapshot(),
        };
        session
    }

    /// Restore the persisted session, if any, and mark hydration complete.
    ///
    /// Safe to call repeatedly: an existing authenticated session is never
    /// replaced or downgraded, and repeated calls do not notify subscribers.
    pub fn hydrate(&self) -> Session {
        let _guard = self.lock();

        if self.is_authenticated() {
            self.inner.state.send_if_modified(|s| !std::mem::replace(&mut s.hydrated, true));
            return self.snapshot();
        }

        let restored = self.read_persisted();
        self.inner.state.send_if_modified(|s| {
            let before = s.clone();
            if let Some((user, token)) = restored {
                s.user = Some(user);
                s.token = Some(token);
            }
            s.hydrated = true;
            *s != before
        });

        let session = self.snapshot();
        info!(
            authenticated = session.is_authenticated(),
            "Session hydrated"
        );
        session
    }

    /// Persist `user` and `token` and mark the session authenticated.
    pub fn set_auth(&self, user: User, token: String) {
        let _guard = self.lock();

        match serde_json::to_string(&user) {
            Ok(json) => {
                self.persist(USER_KEY, &json);
                self.persist(TOKEN_KEY, &token);
            }
            Err(e) => warn!(error = %e, "Failed to serialise session user; not persisted"),
        }

        info!(email = %user.email, "Session authenticated");
        self.inner.state.send_replace(Session {
            user: Some(user),
            token: Some(token),
            hydrated: true,
        });
    }

    /// Remove the persisted session and mark the store unauthenticated.
    ///
    /// Returns whether a session was actually cleared.
    pub fn clear_auth(&self) -> bool {
        let _guard = self.lock();
        self.clear_locked()
    }

    /// Invalidate the session after the backend rejected `token`.
    ///
    /// Only the current token can be invalidated: a rejection of a token that
    /// was already replaced or cleared is ignored. Returns `true` for exactly
    /// one caller per session, which makes concurrent 401s collapse into a
    /// single transition.
    pub fn invalidate(&self, token: &str) -> bool {
        let _guard = self.lock();
        let current = self.inner.state.borrow().token.as_deref() == Some(token);
        if !current {
            debug!("Ignoring rejection of a stale token");
            return false;
        }
        self.clear_locked()
    }

    fn clear_locked(&self) -> bool {
        self.remove(USER_KEY);
        self.remove(TOKEN_KEY);

        let mut was_authenticated = false;
        self.inner.state.send_if_modified(|s| {
            was_authenticated = s.is_authenticated();
            let changed = s.user.is_some() || s.token.is_some() || !s.hydrated;
            *s = Session { user: None, token: None, hydrated: true };
            changed
        });
        if was_authenticated {
            info!("Session cleared");
        }
        was_authenticated
    }

    /// Read `{user, token}` from storage. Anything short of both values
    /// parsing cleanly counts as no session, and stray halves are removed.
    fn read_persisted(&self) -> Option<(User, String)> {
        let storage = &self.inner.storage;
        let (user, token) = match (storage.get(USER_KEY), storage.get(TOKEN_KEY)) {
            (Ok(user), Ok(token)) => (user, token),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        match (user, token) {
            (Some(user), Some(token)) => match serde_json::from_str::<User>(&user) {
                Ok(user) => Some((user, token)),
                Err(e) => {
                    warn!(error = %e, "Persisted session user is corrupt; discarding session");
                    self.remove(USER_KEY);
                    self.remove(TOKEN_KEY);
                    None
                }
            },
            (None, None) => None,
            _ => {
                warn!("Persisted session is incomplete; discarding it");
                self.remove(USER_KEY);
                self.remove(TOKEN_KEY);
                None
            }
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.storage.set(key, value) {
            warn!(key, error = %e, "Failed to persist session value");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.inner.storage.remove(key) {
            warn!(key, error = %e, "Failed to remove persisted session value");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner.write.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}
