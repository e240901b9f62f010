use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// State of one browser session. Empty strings mean "nothing to show".
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SessionState {
    pub post: String,
    pub image: String,
    pub text_error: String,
    pub image_error: String,
    pub n_requests: u32,
    pub feeling_lucky: bool,
    /// The user's editable copy of the style catalog, created on first edit.
    pub edited_styles: Option<Vec<String>>,
    pub topic: String,
    pub style: String,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Styles the page offers: the edited copy if there is one.
    pub fn offered_styles<'a>(&'a self, catalog: &'a [String]) -> &'a [String] {
        match &self.edited_styles {
            Some(styles) => styles.as_slice(),
            None => catalog,
        }
    }
}

struct SessionEntry {
    state: Arc<Mutex<SessionState>>,
    last_access: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            last_access: Instant::now(),
        }
    }
}

/// In-memory session store. Each session sits behind its own mutex so that
/// actions for one session run one at a time while other sessions proceed.
/// Sessions idle for longer than the configured TTL are dropped by
/// [`SessionStore::cleanup_expired`].
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, SessionEntry::new());
        tracing::debug!(session = %id, "Session created");
        id
    }

    /// Lock a session for the duration of one action. Counts as an access.
    pub async fn lock(&self, id: &Uuid) -> Option<OwnedMutexGuard<SessionState>> {
        let session = {
            let mut sessions = self.sessions.write().await;
            let entry = sessions.get_mut(id)?;
            entry.last_access = Instant::now();
            entry.state.clone()
        };
        Some(session.lock_owned().await)
    }

    pub async fn snapshot(&self, id: &Uuid) -> Option<SessionState> {
        let guard = self.lock(id).await?;
        Some(guard.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id).is_some()
    }

    /// Drop sessions not accessed within `max_idle`. Sessions with an action
    /// in flight are kept. Returns how many were removed.
    pub async fn cleanup_expired(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let initial_count = sessions.len();

        sessions.retain(|_, entry| {
            entry.last_access.elapsed() < max_idle || entry.state.try_lock().is_err()
        });

        initial_count - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
