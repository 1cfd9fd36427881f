//! Session storage that keeps the whole payload in the cookie.
//!
//! Bounded by the 4096-byte cookie limit; an oversized session fails at
//! commit time and nothing is written.

use serde_json::Value;

use crate::cookies::{Cookie, CookieOptions};
use crate::sessions::{Session, SessionError, SessionStorage};

pub struct CookieSessionStorage {
    cookie: Cookie,
}

impl CookieSessionStorage {
    pub fn new(cookie: Cookie) -> Self {
        super::warn_if_unsigned(&cookie);
        Self { cookie }
    }
}

impl SessionStorage for CookieSessionStorage {
    fn get_session(&self, cookie_header: Option<&str>) -> Session {
        let data = match self.cookie.parse(cookie_header) {
            Some(Value::Object(map)) => map,
            _ => Default::default(),
        };
        Session::new("", data)
    }

    fn commit_session(&self, session: &Session, options: &CookieOptions) -> Result<String, SessionError> {
        let payload = Value::Object(session.data().clone());
        Ok(self.cookie.serialize(&payload, options)?)
    }

    fn destroy_session(&self, _session: &Session, options: &CookieOptions) -> Result<String, SessionError> {
        Ok(self.cookie.serialize_expired(options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{CookieError, Secrets};
    use serde_json::json;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn request_header(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_payload_round_trip() {
        let storage = CookieSessionStorage::new(Cookie::new("__session").signed(Secrets::new(["s1"])));
        let mut session = storage.get_session(None);
        session.set("theme", "dark");
        session.flash("notice", "saved");

        let header = request_header(&storage.commit_session(&session, &CookieOptions::default()).unwrap());
        let mut restored = storage.get_session(Some(&header));
        assert_eq!(restored.get("theme"), Some(json!("dark")));
        assert_eq!(restored.get("notice"), Some(json!("saved")));
        assert!(!restored.has("notice"));
    }

    #[test]
    fn test_encrypted_payload() {
        let cookie = Cookie::new("__session").encrypted(Secrets::new([KEY])).unwrap();
        let storage = CookieSessionStorage::new(cookie);
        let mut session = Session::default();
        session.set("card", "4242-secret");

        let set_cookie = storage.commit_session(&session, &CookieOptions::default()).unwrap();
        assert!(!set_cookie.contains("4242-secret"));
        let mut restored = storage.get_session(Some(&request_header(&set_cookie)));
        assert_eq!(restored.get("card"), Some(json!("4242-secret")));
    }

    #[test]
    fn test_oversized_commit_fails() {
        let storage = CookieSessionStorage::new(Cookie::new("__session").signed(Secrets::new(["s1"])));
        let mut session = Session::default();
        session.set("blob", "x".repeat(5000));

        let err = storage.commit_session(&session, &CookieOptions::default()).unwrap_err();
        assert!(matches!(err, SessionError::Cookie(CookieError::TooLarge { .. })));
    }
}
