//! In-memory session store.
//!
//! # Design Decisions
//! - DashMap keyed by session id; concurrent commits are last-write-wins
//! - Ids are short random alphanumeric tokens, regenerated on collision
//! - Expired rows are dropped lazily on read

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};

use crate::cookies::Cookie;
use crate::sessions::storage::{IdSessionStorage, SessionDataStore};
use crate::sessions::SessionError;

const SESSION_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
struct StoredSession {
    data: Map<String, Value>,
    expires: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= Utc::now())
    }
}

/// Process-local session rows. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

impl SessionDataStore for MemoryStore {
    fn create(&self, data: &Map<String, Value>, expires: Option<DateTime<Utc>>) -> Result<String, SessionError> {
        loop {
            let id = random_id();
            if let Entry::Vacant(slot) = self.inner.entry(id.clone()) {
                slot.insert(StoredSession {
                    data: data.clone(),
                    expires,
                });
                tracing::debug!(session_id = %id, "Session created");
                return Ok(id);
            }
        }
    }

    fn read(&self, id: &str) -> Option<Map<String, Value>> {
        {
            let row = self.inner.get(id)?;
            if !row.is_expired() {
                return Some(row.data.clone());
            }
        }
        // Guard released above; removing while holding it would deadlock the shard.
        self.inner.remove(id);
        None
    }

    fn update(
        &self,
        id: &str,
        data: &Map<String, Value>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        self.inner.insert(
            id.to_string(),
            StoredSession {
                data: data.clone(),
                expires,
            },
        );
        Ok(())
    }

    fn delete(&self, id: &str) {
        self.inner.remove(id);
    }
}

/// Session storage keeping data in process memory.
pub type MemorySessionStorage = IdSessionStorage<MemoryStore>;

/// Create an in-memory session storage using `cookie` for the id.
pub fn memory_session_storage(cookie: Cookie) -> MemorySessionStorage {
    IdSessionStorage::new(cookie, MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{CookieOptions, Secrets};
    use crate::sessions::SessionStorage;
    use serde_json::json;

    fn storage() -> MemorySessionStorage {
        memory_session_storage(Cookie::new("__session").signed(Secrets::new(["s3cr3t"])))
    }

    fn request_header(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_new_session_is_empty() {
        let storage = storage();
        let session = storage.get_session(None);
        assert_eq!(session.id(), "");
        assert!(session.data().is_empty());

        let session = storage.get_session(Some("__session=forged"));
        assert_eq!(session.id(), "");
    }

    #[test]
    fn test_commit_and_reload() {
        let storage = storage();
        let mut session = storage.get_session(None);
        session.set("user", "ada");

        let set_cookie = storage.commit_session(&session, &CookieOptions::default()).unwrap();
        assert_eq!(storage.store().len(), 1);

        let mut reloaded = storage.get_session(Some(&request_header(&set_cookie)));
        assert_eq!(reloaded.id().len(), SESSION_ID_LEN);
        assert!(reloaded.id().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(reloaded.get("user"), Some(json!("ada")));

        reloaded.set("user", "grace");
        let again = storage.commit_session(&reloaded, &CookieOptions::default()).unwrap();
        assert_eq!(storage.store().len(), 1);
        let mut latest = storage.get_session(Some(&request_header(&again)));
        assert_eq!(latest.get("user"), Some(json!("grace")));
    }

    #[test]
    fn test_destroy_removes_row() {
        let storage = storage();
        let mut session = storage.get_session(None);
        session.set("k", true);
        let header = request_header(&storage.commit_session(&session, &CookieOptions::default()).unwrap());
        let session = storage.get_session(Some(&header));

        let expired = storage.destroy_session(&session, &CookieOptions::default()).unwrap();
        assert!(expired.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(storage.store().is_empty());
        assert!(storage.get_session(Some(&header)).data().is_empty());
    }

    #[test]
    fn test_expired_rows_are_dropped() {
        let storage = storage();
        let session = storage.get_session(None);
        let header = request_header(
            &storage
                .commit_session(&session, &CookieOptions::default().max_age(-1))
                .unwrap(),
        );
        assert!(storage.get_session(Some(&header)).data().is_empty());
        assert!(storage.store().is_empty());
    }

    #[test]
    fn test_concurrent_commits() {
        let storage = Arc::new(storage());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    let mut session = storage.get_session(None);
                    session.set("n", i);
                    storage.commit_session(&session, &CookieOptions::default()).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(storage.store().len(), 8);
    }
}
