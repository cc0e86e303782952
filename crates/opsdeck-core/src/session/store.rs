//! Process-wide session state
//!
//! All mutation goes through `SessionStore` methods: the derived
//! `authenticated` flag is recomputed, the `{user, access_token}` subset is
//! persisted, and the new snapshot is broadcast to watchers after every
//! change. Presentation layers subscribe to the broadcast both to re-render
//! and to route back to the login screen when the session is cleared.

use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::state::{PersistedSession, Session, User};

pub struct SessionStore {
    inner: Mutex<Session>,
    changes: watch::Sender<Session>,
    persist_path: Option<PathBuf>,
}

impl SessionStore {
    /// In-memory store with no persistence
    pub fn new() -> Self {
        Self::from_parts(Session::default(), None)
    }

    /// Store that saves the `{user, token}` subset to `path`, rehydrating
    /// from it when the file exists. Unreadable files start logged out.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut session = Session::default();

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PersistedSession>(&contents) {
                Ok(persisted) => {
                    session.user = persisted.user;
                    session.access_token = persisted.access_token;
                    session.recompute();
                    debug!(authenticated = session.authenticated, "restored session state");
                }
                Err(err) => warn!(%err, "session file unreadable, starting logged out"),
            },
            // Missing file is the normal first run
            Err(_) => {}
        }

        Self::from_parts(session, Some(path))
    }

    fn from_parts(session: Session, persist_path: Option<PathBuf>) -> Self {
        let (changes, _) = watch::channel(session.clone());
        Self {
            inner: Mutex::new(session),
            changes,
            persist_path,
        }
    }

    /// Current state, cloned
    pub fn snapshot(&self) -> Session {
        self.inner.lock().unwrap().clone()
    }

    /// Watch session changes; receives a snapshot after every mutation
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.changes.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.lock().unwrap().access_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().authenticated
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().unwrap().busy
    }

    pub fn set_user(&self, user: Option<User>) {
        self.mutate(|session| session.user = user);
    }

    pub fn set_access_token(&self, token: Option<String>) {
        self.mutate(|session| session.access_token = token);
    }

    pub fn set_busy(&self, busy: bool) {
        self.mutate(|session| session.busy = busy);
    }

    /// Wipe identity, token and the busy flag. Watchers observe a logged-out
    /// snapshot, which is the route-to-login signal.
    pub fn clear(&self) {
        self.mutate(|session| {
            session.user = None;
            session.access_token = None;
            session.busy = false;
        });
    }

    fn mutate(&self, apply: impl FnOnce(&mut Session)) {
        let snapshot = {
            let mut session = self.inner.lock().unwrap();
            apply(&mut session);
            session.recompute();
            session.clone()
        };
        self.persist(&snapshot);
        self.changes.send_replace(snapshot);
    }

    /// Best-effort write of the persisted subset; failures are logged and
    /// never surfaced to the mutation that triggered them.
    fn persist(&self, session: &Session) {
        let Some(path) = &self.persist_path else {
            return;
        };

        let persisted = PersistedSession {
            user: session.user.clone(),
            access_token: session.access_token.clone(),
        };

        let result = serde_json::to_string_pretty(&persisted)
            .map_err(std::io::Error::other)
            .and_then(|contents| {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                std::fs::write(path, contents)
            });

        if let Err(err) = result {
            warn!(%err, path = %path.display(), "failed to persist session");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_flag_tracks_every_mutation() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());

        store.set_access_token(Some("T1".to_string()));
        assert!(!store.is_authenticated());

        store.set_user(Some(User::new("alice")));
        assert!(store.is_authenticated());

        store.set_access_token(None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_wipes_identity_token_and_busy() {
        let store = SessionStore::new();
        store.set_user(Some(User::new("alice")));
        store.set_access_token(Some("T1".to_string()));
        store.set_busy(true);

        store.clear();

        let session = store.snapshot();
        assert!(session.user.is_none());
        assert!(session.access_token.is_none());
        assert!(!session.authenticated);
        assert!(!session.busy);
    }

    #[test]
    fn test_watchers_observe_mutations() {
        let store = SessionStore::new();
        let rx = store.subscribe();

        store.set_user(Some(User::new("alice")));
        store.set_access_token(Some("T1".to_string()));
        assert!(rx.borrow().authenticated);

        store.clear();
        assert!(!rx.borrow().authenticated);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = SessionStore::load(&path);
            store.set_user(Some(User {
                id: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
                name: Some("Alice".to_string()),
            }));
            store.set_access_token(Some("T1".to_string()));
        }

        let restored = SessionStore::load(&path);
        let session = restored.snapshot();
        assert!(session.authenticated);
        assert_eq!(session.access_token.as_deref(), Some("T1"));
        assert_eq!(session.user.unwrap().id, "alice");
    }

    #[test]
    fn test_busy_flag_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = SessionStore::load(&path);
            store.set_user(Some(User::new("alice")));
            store.set_access_token(Some("T1".to_string()));
            store.set_busy(true);
        }

        let restored = SessionStore::load(&path);
        assert!(!restored.is_busy());
        assert!(restored.is_authenticated());
    }

    #[test]
    fn test_corrupt_session_file_starts_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = SessionStore::load(&path);
        assert!(!store.is_authenticated());
        assert!(store.snapshot().user.is_none());
    }
}
