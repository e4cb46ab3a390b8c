use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::auth::models::Role;
use crate::basket::models::Basket;

/// Snapshot of the logged-in user kept in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl SessionUser {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub basket: Basket,
    pub user: Option<SessionUser>,
}

#[derive(Debug)]
struct SessionEntry {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
    ttl: Duration,
    secure_cookie: bool,
}

impl SessionStore {
    pub fn new(ttl: Duration, secure_cookie: bool) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
            secure_cookie,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn secure_cookie(&self) -> bool {
        self.secure_cookie
    }

    /// Returns the data of a live session. Expired sessions are evicted.
    pub fn load(&self, id: &Uuid) -> Option<SessionData> {
        let now = Utc::now();

        let expired = match self.sessions.get(id) {
            Some(entry) if entry.expires_at > now => return Some(entry.data.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove_if(id, |_, entry| entry.expires_at <= now);
        }

        None
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.load(id).is_some()
    }

    /// Runs `f` against the session data while holding the entry lock, then
    /// pushes the expiry forward. Missing or expired sessions start empty.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let now = Utc::now();

        let mut entry = self.sessions.entry(id).or_insert_with(|| SessionEntry {
            data: SessionData::default(),
            expires_at: now,
        });

        if entry.expires_at <= now {
            entry.data = SessionData::default();
        }
        entry.expires_at = self.expiry_from(now);

        f(&mut entry.data)
    }

    /// Moves the data of session `old` under a fresh id and returns that id.
    /// The old id stops resolving.
    pub fn cycle(&self, old: &Uuid) -> Uuid {
        let data = self
            .sessions
            .remove(old)
            .filter(|(_, entry)| entry.expires_at > Utc::now())
            .map(|(_, entry)| entry.data)
            .unwrap_or_default();

        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            SessionEntry {
                data,
                expires_at: self.expiry_from(Utc::now()),
            },
        );

        id
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn remove(&self, id: &Uuid) {
        self.sessions.remove(id);
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn spawn_cleanup(&self, every: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, "expired sessions removed");
                }
            }
        })
    }
}
