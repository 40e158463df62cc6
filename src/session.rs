//! Ephemeral handshake sessions.
//!
//! A session is created for every handshake and lives until its expiry
//! horizon passes and a sweep removes it. Sessions are not consulted by any
//! other request; they are bookkeeping, not authorization, so ids are unique
//! on a best-effort basis rather than cryptographically.
//!
//! The store does not run its own timer. Whoever owns the
//! [`Dispatcher`](crate::Dispatcher) calls [`SessionStore::sweep_expired`]
//! periodically, e.g. from a `tokio::time::interval` loop.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default lifetime of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

const SUFFIX_LEN: usize = 9;

/// A handshake session.
///
/// Serializes with unix-millisecond timestamps:
/// `{"id":"session_...","createdAt":1700000000000,"expiresAt":1700003600000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: String,
    #[serde(serialize_with = "serialize_unix_millis")]
    created_at: SystemTime,
    #[serde(serialize_with = "serialize_unix_millis")]
    expires_at: SystemTime,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// A session is expired from its expiry instant onwards.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at <= now
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn serialize_unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(unix_millis(*time))
}

fn generate_id(now: SystemTime) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("session_{}_{}", unix_millis(now), suffix.to_ascii_lowercase())
}

/// Owns every live session.
///
/// Handshakes may arrive concurrently on several runtime threads, so the map
/// is behind a `Mutex`.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    /// Creates an empty store whose sessions live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and stores a new session starting now.
    pub fn create(&self) -> Session {
        self.create_at(SystemTime::now())
    }

    /// Creates and stores a new session starting at `now`.
    pub fn create_at(&self, now: SystemTime) -> Session {
        let mut sessions = self.sessions();
        let mut id = generate_id(now);
        while sessions.contains_key(&id) {
            id = generate_id(now);
        }
        let session = Session {
            id: id.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Removes every session that has expired, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(SystemTime::now())
    }

    /// Removes every session expired as of `now`.
    pub fn sweep_expired_at(&self, now: SystemTime) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            logwise::info_sync!(
                "swept {removed} expired sessions",
                removed = logwise::privacy::LogIt(&removed)
            );
        }
        removed
    }
}
