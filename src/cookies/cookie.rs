//! Cookie definitions and the `Set-Cookie` / `Cookie` header codec.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::cookies::crypto::{self, Secrets, MIN_ENCRYPTION_SECRET_LEN};
use crate::cookies::CookieError;

/// Browsers drop cookies larger than this.
pub const MAX_COOKIE_SIZE: usize = 4096;

/// `SameSite` attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

/// `Priority` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Cookie attributes. Unset fields fall back to the cookie definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Lifetime in seconds.
    pub max_age: Option<i64>,
    #[serde(skip)]
    pub expires: Option<DateTime<Utc>>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSite>,
    pub priority: Option<Priority>,
    pub partitioned: Option<bool>,
}

impl CookieOptions {
    /// Overlay `overrides` on top of `self`.
    pub fn merged(&self, overrides: &CookieOptions) -> CookieOptions {
        CookieOptions {
            domain: overrides.domain.clone().or_else(|| self.domain.clone()),
            path: overrides.path.clone().or_else(|| self.path.clone()),
            max_age: overrides.max_age.or(self.max_age),
            expires: overrides.expires.or(self.expires),
            http_only: overrides.http_only.or(self.http_only),
            secure: overrides.secure.or(self.secure),
            same_site: overrides.same_site.or(self.same_site),
            priority: overrides.priority.or(self.priority),
            partitioned: overrides.partitioned.or(self.partitioned),
        }
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }
}

/// A named cookie definition with optional signing or encryption.
#[derive(Debug, Clone)]
pub struct Cookie {
    name: String,
    secrets: Secrets,
    encrypt: bool,
    options: CookieOptions,
}

impl Cookie {
    /// Unsigned cookie with `Path=/` and `SameSite=Lax`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secrets: Secrets::default(),
            encrypt: false,
            options: CookieOptions {
                path: Some("/".to_string()),
                same_site: Some(SameSite::Lax),
                ..CookieOptions::default()
            },
        }
    }

    /// Replace the default attributes (path and same-site defaults are kept
    /// unless `options` sets them).
    pub fn with_options(mut self, options: CookieOptions) -> Self {
        if options.expires.is_some() {
            tracing::warn!(
                cookie = %self.name,
                "Cookie definition sets `expires`; it will not be refreshed on commit. \
                 Pass `expires` when serializing instead"
            );
        }
        self.options = self.options.merged(&options);
        self
    }

    /// Sign values with HMAC-SHA256. Secrets are ordered newest first.
    pub fn signed(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self.encrypt = false;
        self
    }

    /// Encrypt values with AES-256-GCM instead of signing them.
    pub fn encrypted(mut self, secrets: Secrets) -> Result<Self, CookieError> {
        if secrets.is_empty() {
            return Err(CookieError::MissingSecret(self.name));
        }
        if secrets.iter().any(|s| s.len() < MIN_ENCRYPTION_SECRET_LEN) {
            return Err(CookieError::WeakSecret {
                name: self.name,
                min: MIN_ENCRYPTION_SECRET_LEN,
            });
        }
        self.secrets = secrets;
        self.encrypt = true;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    pub fn is_signed(&self) -> bool {
        !self.secrets.is_empty()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt
    }

    /// Encode `value` and render a `Set-Cookie` header value.
    pub fn serialize(&self, value: &Value, overrides: &CookieOptions) -> Result<String, CookieError> {
        let options = self.options.merged(overrides);
        self.serialize_resolved(value, options)
    }

    /// `Set-Cookie` value that expires the cookie immediately.
    pub fn serialize_expired(&self, overrides: &CookieOptions) -> Result<String, CookieError> {
        let mut options = self.options.merged(overrides);
        options.max_age = None;
        options.expires = Some(DateTime::<Utc>::UNIX_EPOCH);
        self.serialize_resolved(&Value::String(String::new()), options)
    }

    /// Decode this cookie from a `Cookie` request header.
    ///
    /// Returns `None` when the cookie is absent or fails to verify/decrypt.
    pub fn parse(&self, cookie_header: Option<&str>) -> Option<Value> {
        let raw = find_cookie(cookie_header?, &self.name)?;
        if raw.is_empty() {
            return Some(Value::String(String::new()));
        }

        if self.encrypt {
            let plaintext = self.secrets.first_success(|secret| crypto::decrypt(raw, secret))?;
            return serde_json::from_slice(&plaintext).ok();
        }

        if self.is_signed() {
            let encoded = self.secrets.first_success(|secret| crypto::unsign(raw, secret))?;
            return decode_value(&encoded);
        }

        decode_value(raw)
    }

    fn serialize_resolved(&self, value: &Value, mut options: CookieOptions) -> Result<String, CookieError> {
        let json = serde_json::to_vec(value)?;

        let encoded = match (self.encrypt, self.secrets.newest()) {
            (true, Some(secret)) => crypto::encrypt(&json, secret)?,
            (true, None) => return Err(CookieError::MissingSecret(self.name.clone())),
            (false, Some(secret)) => crypto::sign(&URL_SAFE_NO_PAD.encode(&json), secret)?,
            (false, None) => URL_SAFE_NO_PAD.encode(&json),
        };

        if let Some(max_age) = options.max_age {
            options.expires = Some(Utc::now() + Duration::seconds(max_age));
        }

        let header = format_set_cookie(&self.name, &encoded, &options);
        if header.len() > MAX_COOKIE_SIZE {
            return Err(CookieError::TooLarge {
                name: self.name.clone(),
                size: header.len(),
            });
        }
        Ok(header)
    }
}

fn decode_value(encoded: &str) -> Option<Value> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Find a cookie's raw value in a `Cookie` header.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}

fn format_set_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut out = format!("{name}={value}");

    if let Some(max_age) = options.max_age {
        out.push_str(&format!("; Max-Age={max_age}"));
    }
    if let Some(domain) = &options.domain {
        out.push_str(&format!("; Domain={domain}"));
    }
    if let Some(path) = &options.path {
        out.push_str(&format!("; Path={path}"));
    }
    if let Some(expires) = options.expires {
        out.push_str(&format!("; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
    }
    if options.http_only == Some(true) {
        out.push_str("; HttpOnly");
    }
    if options.partitioned == Some(true) {
        out.push_str("; Partitioned");
    }
    if let Some(priority) = options.priority {
        out.push_str(match priority {
            Priority::Low => "; Priority=Low",
            Priority::Medium => "; Priority=Medium",
            Priority::High => "; Priority=High",
        });
    }
    if let Some(same_site) = options.same_site {
        out.push_str(match same_site {
            SameSite::Lax => "; SameSite=Lax",
            SameSite::Strict => "; SameSite=Strict",
            SameSite::None => "; SameSite=None",
        });
    }
    if options.secure == Some(true) {
        out.push_str("; Secure");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    /// `name=value` part of a `Set-Cookie` header, usable as a `Cookie` header.
    fn request_header(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_signed_round_trip() {
        let cookie = Cookie::new("prefs").signed(Secrets::new(["s1"]));
        let set_cookie = cookie.serialize(&json!({"hello": "x"}), &CookieOptions::default()).unwrap();
        let header = request_header(&set_cookie);

        assert_eq!(cookie.parse(Some(&header)), Some(json!({"hello": "x"})));

        let other = Cookie::new("prefs").signed(Secrets::new(["s2"]));
        assert_eq!(other.parse(Some(&header)), None);
    }

    #[test]
    fn test_rotated_secret_still_parses() {
        let old = Cookie::new("prefs").signed(Secrets::new(["old"]));
        let header = request_header(&old.serialize(&json!(1), &CookieOptions::default()).unwrap());

        let rotated = Cookie::new("prefs").signed(Secrets::new(["new", "old"]));
        assert_eq!(rotated.parse(Some(&header)), Some(json!(1)));
    }

    #[test]
    fn test_unsigned_round_trip() {
        let cookie = Cookie::new("theme");
        assert!(!cookie.is_signed());
        let header = request_header(&cookie.serialize(&json!("dark"), &CookieOptions::default()).unwrap());
        assert_eq!(cookie.parse(Some(&format!("a=b; {header}; c=d"))), Some(json!("dark")));
    }

    #[test]
    fn test_encrypted_hides_plaintext() {
        let cookie = Cookie::new("vault").encrypted(Secrets::new([KEY])).unwrap();
        let set_cookie = cookie
            .serialize(&json!({"hello": "plaintext-marker"}), &CookieOptions::default())
            .unwrap();

        assert!(!set_cookie.contains("plaintext-marker"));
        assert!(!set_cookie.contains(&URL_SAFE_NO_PAD.encode(b"{\"hello\":\"plaintext-marker\"}")));
        assert_eq!(
            cookie.parse(Some(&request_header(&set_cookie))),
            Some(json!({"hello": "plaintext-marker"}))
        );
    }

    #[test]
    fn test_encryption_requires_strong_secret() {
        assert!(matches!(
            Cookie::new("vault").encrypted(Secrets::default()),
            Err(CookieError::MissingSecret(_))
        ));
        assert!(matches!(
            Cookie::new("vault").encrypted(Secrets::new(["short"])),
            Err(CookieError::WeakSecret { .. })
        ));
    }

    #[test]
    fn test_garbage_parses_to_none() {
        let cookie = Cookie::new("prefs").signed(Secrets::new(["s1"]));
        assert_eq!(cookie.parse(Some("prefs=not-valid")), None);
        assert_eq!(cookie.parse(Some("other=1")), None);
        assert_eq!(cookie.parse(None), None);
    }

    #[test]
    fn test_attributes() {
        let cookie = Cookie::new("sid").with_options(CookieOptions {
            http_only: Some(true),
            secure: Some(true),
            priority: Some(Priority::High),
            domain: Some("example.com".into()),
            ..CookieOptions::default()
        });
        let header = cookie
            .serialize(&json!("x"), &CookieOptions::default().max_age(60))
            .unwrap();

        assert!(header.contains("; Max-Age=60"));
        assert!(header.contains("; Path=/"));
        assert!(header.contains("; Domain=example.com"));
        assert!(header.contains("; Expires="));
        assert!(header.contains("; HttpOnly"));
        assert!(header.contains("; Secure"));
        assert!(header.contains("; Priority=High"));
        assert!(header.contains("; SameSite=Lax"));
    }

    #[test]
    fn test_expired_header() {
        let cookie = Cookie::new("sid").with_options(CookieOptions::default().max_age(60));
        let header = cookie.serialize_expired(&CookieOptions::default()).unwrap();
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(!header.contains("Max-Age"));
    }

    #[test]
    fn test_size_limit() {
        let cookie = Cookie::new("big");
        let value = json!("x".repeat(MAX_COOKIE_SIZE));
        assert!(matches!(
            cookie.serialize(&value, &CookieOptions::default()),
            Err(CookieError::TooLarge { .. })
        ));
    }
}
