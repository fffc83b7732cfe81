use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::auth::Credentials;
use crate::identity::IdentityProvider;
use crate::store::Store;

/// Opaque session token -> (value, expires_at). Expired entries are dropped on lookup.
#[derive(Debug, Clone)]
pub struct SessionStore<V> {
    inner: Arc<DashMap<String, (V, Instant)>>,
    ttl: Duration,
}

impl<V: Clone> SessionStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, value: V) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let expires = Instant::now() + self.ttl;
        self.inner.insert(token.clone(), (value, expires));
        token
    }

    pub fn get(&self, token: &str) -> Option<V> {
        let entry = self.inner.get(token)?;
        if entry.1 > Instant::now() {
            Some(entry.0.clone())
        } else {
            drop(entry);
            self.inner.remove(token);
            None
        }
    }

    pub fn remove(&self, token: &str) {
        self.inner.remove(token);
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, (_, expires)| *expires > now);
        before.saturating_sub(self.inner.len())
    }
}

/// Runtime knobs the handlers need from the configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub secure_cookies: bool,
    pub edit_window: chrono::Duration,
    pub max_upload_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub identity: Arc<dyn IdentityProvider>,
    pub credentials: Arc<Credentials>,
    /// Admin console sessions, keyed to the console username.
    pub admin_sessions: SessionStore<String>,
    /// Support sessions, keyed to the `support_staff` id.
    pub support_sessions: SessionStore<i64>,
    pub settings: Arc<ServerSettings>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::SessionStore;

    #[test]
    fn sessions_resolve_until_removed() {
        let sessions = SessionStore::new(Duration::from_secs(60));
        let token = sessions.create(String::from("owner"));
        assert_eq!(sessions.get(&token).as_deref(), Some("owner"));
        sessions.remove(&token);
        assert!(sessions.get(&token).is_none());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let sessions = SessionStore::new(Duration::ZERO);
        let token = sessions.create(7_i64);
        assert!(sessions.get(&token).is_none());
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let expired = SessionStore::new(Duration::ZERO);
        expired.create(1_i64);
        expired.create(2_i64);
        assert_eq!(expired.purge_expired(), 2);

        let live = SessionStore::new(Duration::from_secs(60));
        let token = live.create(3_i64);
        assert_eq!(live.purge_expired(), 0);
        assert_eq!(live.get(&token), Some(3));
    }
}
