//! Cookie codec.
//!
//! # Data Flow
//! ```text
//! serialize:
//!     JSON value → base64url
//!         → crypto.rs sign (HMAC, newest secret)  or  encrypt (AES-GCM, newest secret)
//!         → cookie.rs Set-Cookie attributes → size check (≤ 4096 bytes)
//!
//! parse:
//!     Cookie header → find by name
//!         → try each secret in order (verify or decrypt)
//!         → base64url → JSON value, or None
//! ```
//!
//! # Design Decisions
//! - Pure and stateless; safe to share across threads
//! - Parsing never errors: an unreadable cookie is an absent cookie
//! - Signing and encryption are mutually exclusive

pub mod cookie;
pub mod crypto;

use thiserror::Error;

pub use cookie::{Cookie, CookieOptions, Priority, SameSite, MAX_COOKIE_SIZE};
pub use crypto::Secrets;

/// Errors raised when producing cookies.
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookie `{name}` is {size} bytes, exceeding the {max} byte limit", max = MAX_COOKIE_SIZE)]
    TooLarge { name: String, size: usize },

    #[error("cookie `{0}` is encrypted but has no secrets")]
    MissingSecret(String),

    #[error("cookie `{name}` needs encryption secrets of at least {min} bytes")]
    WeakSecret { name: String, min: usize },

    #[error("cookie encryption failed")]
    Encryption,

    #[error("cookie signing failed")]
    Signing,

    #[error("cookie value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}
