//! Session storage subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → get_session (parse cookie → id or payload → Session)
//!     → loader/action mutates Session (set / flash / unset)
//!     → commit_session → Set-Cookie   |   destroy_session → expired Set-Cookie
//! ```
//!
//! # Backends
//! - memory.rs: id in cookie, data in a process-wide DashMap
//! - cookie_storage.rs: whole payload in the signed/encrypted cookie
//! - storage.rs: generic id-backed storage over any `SessionDataStore`

pub mod cookie_storage;
pub mod memory;
pub mod session;
pub mod storage;

use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::{SessionBackend, SessionConfig};
use crate::cookies::{Cookie, CookieError, CookieOptions, Secrets};

pub use cookie_storage::CookieSessionStorage;
pub use memory::{memory_session_storage, MemorySessionStorage, MemoryStore};
pub use session::Session;
pub use storage::{IdSessionStorage, SessionDataStore};

/// Errors raised while persisting sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error("session store failure: {0}")]
    Store(String),
}

/// Session lifecycle operations shared by all backends.
pub trait SessionStorage: Send + Sync {
    /// Load the session named by the request cookie; empty when absent or invalid.
    fn get_session(&self, cookie_header: Option<&str>) -> Session;

    /// Persist the session and return the `Set-Cookie` value.
    fn commit_session(&self, session: &Session, options: &CookieOptions) -> Result<String, SessionError>;

    /// Drop the session and return an already-expired `Set-Cookie` value.
    fn destroy_session(&self, session: &Session, options: &CookieOptions) -> Result<String, SessionError>;
}

/// Shared storage handle placed in the per-request load context.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<dyn SessionStorage>);

impl std::ops::Deref for SessionHandle {
    type Target = dyn SessionStorage;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionHandle")
    }
}

fn warn_if_unsigned(cookie: &Cookie) {
    if !cookie.is_signed() {
        tracing::warn!(
            cookie = %cookie.name(),
            "Session cookie is not signed; add secrets so clients cannot forge session data"
        );
    }
}

/// Build the session storage described by `config`.
pub fn from_config(config: &SessionConfig) -> Result<SessionHandle, CookieError> {
    let cookie = Cookie::new(config.cookie.name.as_str()).with_options(config.cookie.options.clone());
    let secrets = Secrets::new(config.cookie.secrets.iter().cloned());
    let cookie = if config.cookie.encrypt {
        cookie.encrypted(secrets)?
    } else {
        cookie.signed(secrets)
    };

    let storage: Arc<dyn SessionStorage> = match config.backend {
        SessionBackend::Memory => Arc::new(memory_session_storage(cookie)),
        SessionBackend::Cookie => Arc::new(CookieSessionStorage::new(cookie)),
    };
    tracing::debug!(backend = ?config.backend, cookie = %config.cookie.name, "Session storage ready");
    Ok(SessionHandle(storage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_backends() {
        let mut config = SessionConfig::default();
        config.cookie.secrets = vec!["s3cr3t".into()];
        let handle = from_config(&config).unwrap();
        let mut session = handle.get_session(None);
        session.set("k", 1);
        let set_cookie = handle.commit_session(&session, &CookieOptions::default()).unwrap();
        assert!(set_cookie.starts_with("__session="));

        config.backend = SessionBackend::Cookie;
        config.cookie.encrypt = true;
        assert!(matches!(from_config(&config), Err(CookieError::WeakSecret { .. })));

        config.cookie.secrets = vec!["0123456789abcdef0123456789abcdef".into()];
        let handle = from_config(&config).unwrap();
        let set_cookie = handle.commit_session(&session, &CookieOptions::default()).unwrap();
        let header = set_cookie.split(';').next().unwrap();
        let mut reloaded = handle.get_session(Some(header));
        assert_eq!(reloaded.get("k"), Some(serde_json::json!(1)));
    }
}
