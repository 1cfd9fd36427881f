//! Signing and encryption primitives for cookie values.
//!
//! # Responsibilities
//! - HMAC-SHA256 sign/verify (`value.signature`)
//! - AES-256-GCM encrypt/decrypt (`base64url(nonce || ciphertext)`)
//! - Ordered secret rotation
//!
//! # Design Decisions
//! - Newest secret first; writes always use it, reads accept the first that works
//! - Verification and decryption never fail loudly, they return `None`
//! - Signature comparison is constant time (`Mac::verify_slice`)

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::cookies::CookieError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum secret length accepted for encrypted cookies.
pub const MIN_ENCRYPTION_SECRET_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// Ordered list of secrets, newest first.
///
/// Producers use [`Secrets::newest`]. Consumers call [`Secrets::first_success`],
/// which tries every secret in order and returns the first result that
/// verifies; no position in the list is treated specially when reading.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets(Vec<String>);

impl Secrets {
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(secrets.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The secret used for new signatures and ciphertexts.
    pub fn newest(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Try each secret in order; first `Some` wins.
    pub fn first_success<T>(&self, f: impl FnMut(&str) -> Option<T>) -> Option<T> {
        self.iter().find_map(f)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secrets([REDACTED; {}])", self.0.len())
    }
}

/// Append an HMAC-SHA256 signature to `value`.
pub fn sign(value: &str, secret: &str) -> Result<String, CookieError> {
    let mut mac = mac_for(secret).ok_or(CookieError::Signing)?;
    mac.update(value.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{value}.{signature}"))
}

/// Verify a signed value against one secret and return the payload.
pub fn unsign(signed: &str, secret: &str) -> Option<String> {
    let (value, signature) = signed.rsplit_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

    let mut mac = mac_for(secret)?;
    mac.update(value.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(value.to_string())
}

/// Encrypt `plaintext` under a key derived from `secret`.
pub fn encrypt(plaintext: &[u8], secret: &str) -> Result<String, CookieError> {
    let cipher = cipher_for(secret)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CookieError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(out))
}

/// Decrypt a token produced by [`encrypt`]; `None` on any failure.
pub fn decrypt(token: &str, secret: &str) -> Option<Vec<u8>> {
    let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
    if raw.len() <= NONCE_LEN {
        return None;
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    cipher_for(secret)
        .ok()?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()
}

fn mac_for(secret: &str) -> Option<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).ok()
}

fn cipher_for(secret: &str) -> Result<Aes256Gcm, CookieError> {
    let key = Sha256::digest(secret.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|_| CookieError::Encryption)
}
