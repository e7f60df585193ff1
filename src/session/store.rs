use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, info};

use super::{Session, SessionError};

pub type SessionStore = Arc<dyn SessionStoreType>;

/// Pluggable backing storage for sessions.
///
/// Each request loads its session once, mutates the handle, and saves it
/// when the pipeline unwinds. The store is the only state shared between
/// requests: two concurrent requests for the same key each save their own
/// view and the last save wins. Stores that need stronger guarantees must
/// provide read-merge-write themselves.
#[async_trait]
pub trait SessionStoreType: Send + Sync + Debug {
    /// Returns the session if one is stored under `session_id`.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    /// Returns the stored session or a fresh, empty one.
    async fn load(&self, session_id: &str) -> Result<Session, SessionError>;

    /// Persists the session and (re)applies `ttl`.
    async fn save(&self, session: &Session, ttl: Duration) -> Result<(), SessionError>;

    /// Removes a session (e.g. after the flow terminated).
    async fn remove(&self, session_id: &str) -> Result<(), SessionError>;

    /// Removes every session (tests and shutdown).
    fn clear(&self);
}

#[derive(Clone)]
struct StoredSession {
    data: Arc<DashMap<String, Value>>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was last saved with.
struct SessionExpiry;

impl Expiry<String, StoredSession> for SessionExpiry {
    fn expire_after_create(&self, _key: &String, value: &StoredSession, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredSession,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local store on a `moka` cache.
#[derive(Clone, Debug)]
pub struct InMemorySessionStore {
    cache: Cache<String, StoredSession>,
}

impl Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("keys", &self.data.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Arc<Self> {
        let cache = Cache::builder()
            .expire_after(SessionExpiry)
            .eviction_listener(|key: Arc<String>, _value: StoredSession, cause| {
                info!("Session evicted: key={}, cause={:?}", key, cause);
            })
            .build();
        Arc::new(Self { cache })
    }
}

#[async_trait]
impl SessionStoreType for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self
            .cache
            .get(session_id)
            .await
            .map(|stored| Session::from_parts(session_id, stored.data)))
    }

    async fn load(&self, session_id: &str) -> Result<Session, SessionError> {
        match self.get(session_id).await? {
            Some(session) => Ok(session),
            None => {
                debug!(session = session_id, "starting new session");
                Ok(Session::new(session_id))
            }
        }
    }

    async fn save(&self, session: &Session, ttl: Duration) -> Result<(), SessionError> {
        self.cache
            .insert(
                session.id().to_string(),
                StoredSession {
                    data: session.data(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        self.cache.invalidate(session_id).await;
        Ok(())
    }

    fn clear(&self) {
        self.cache.invalidate_all();
    }
}
