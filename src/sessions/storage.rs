//! Session storage backed by a server-side data store keyed by id.
//!
//! The cookie carries only the (signed) session id; the store is the source
//! of truth for the data.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::cookies::{Cookie, CookieOptions};
use crate::sessions::{Session, SessionError, SessionStorage};

/// Persistence strategy behind an [`IdSessionStorage`].
pub trait SessionDataStore: Send + Sync {
    /// Persist new data and return its freshly generated id.
    fn create(&self, data: &Map<String, Value>, expires: Option<DateTime<Utc>>) -> Result<String, SessionError>;

    /// Load data for `id`; `None` when unknown or expired.
    fn read(&self, id: &str) -> Option<Map<String, Value>>;

    fn update(
        &self,
        id: &str,
        data: &Map<String, Value>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError>;

    fn delete(&self, id: &str);
}

/// Generic id-cookie session storage.
pub struct IdSessionStorage<S> {
    cookie: Cookie,
    store: S,
}

impl<S: SessionDataStore> IdSessionStorage<S> {
    pub fn new(cookie: Cookie, store: S) -> Self {
        super::warn_if_unsigned(&cookie);
        Self { cookie, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn expiry(&self, options: &CookieOptions) -> Option<DateTime<Utc>> {
        let defaults = self.cookie.options();
        match (options.max_age, options.expires) {
            (Some(max_age), _) => Some(Utc::now() + Duration::seconds(max_age)),
            (None, Some(expires)) => Some(expires),
            (None, None) => defaults
                .max_age
                .map(|max_age| Utc::now() + Duration::seconds(max_age))
                .or(defaults.expires),
        }
    }
}

impl<S: SessionDataStore> SessionStorage for IdSessionStorage<S> {
    fn get_session(&self, cookie_header: Option<&str>) -> Session {
        let id = self
            .cookie
            .parse(cookie_header)
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default();

        let data = if id.is_empty() {
            None
        } else {
            self.store.read(&id)
        };
        Session::new(id, data.unwrap_or_default())
    }

    fn commit_session(&self, session: &Session, options: &CookieOptions) -> Result<String, SessionError> {
        let expires = self.expiry(options);
        let id = if session.id().is_empty() {
            self.store.create(session.data(), expires)?
        } else {
            self.store.update(session.id(), session.data(), expires)?;
            session.id().to_string()
        };

        Ok(self.cookie.serialize(&Value::String(id), options)?)
    }

    fn destroy_session(&self, session: &Session, options: &CookieOptions) -> Result<String, SessionError> {
        if !session.id().is_empty() {
            self.store.delete(session.id());
        }
        Ok(self.cookie.serialize_expired(options)?)
    }
}
