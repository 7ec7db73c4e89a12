//! Token codec: generation and one-way digest of bearer tokens.
//!
//! The plaintext exists only in memory, is returned exactly once by
//! [`generate`], and is wiped on drop. Everything that is stored or logged
//! is derived from [`digest`].

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Literal marker every token starts with.
pub const TOKEN_PREFIX: &str = "d2d_";

/// 24 random bytes = 192 bits of entropy.
const SECRET_BYTES: usize = 24;

/// Encoded length of the random part (base64url, no padding).
const SECRET_CHARS: usize = SECRET_BYTES / 3 * 4;

/// Length of the digest prefix used in log lines and operator listings.
const SHORT_DIGEST_LEN: usize = 12;

/// A freshly generated token. Has no `Display`, `Clone` or
/// `Serialize` impl.
pub struct PlaintextToken(Zeroizing<String>);

impl PlaintextToken {
    /// The secret itself. Only the issuing operator command should print this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn digest(&self) -> TokenDigest {
        digest(&self.0)
    }
}

impl fmt::Debug for PlaintextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlaintextToken({TOKEN_PREFIX}***)")
    }
}

/// Hex-encoded SHA-256 of a token plaintext. The only form of a token
/// that is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenDigest(String);

impl TokenDigest {
    /// Accepts a full 64-character hex digest (case-insensitive).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_DIGEST_LEN]
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a new random token: `d2d_` followed by 32 base64url characters.
pub fn generate() -> PlaintextToken {
    let mut bytes = Zeroizing::new([0u8; SECRET_BYTES]);
    OsRng.fill_bytes(&mut *bytes);

    // Pre-sized so encoding never reallocates and leaves an unwiped copy behind.
    let mut token = Zeroizing::new(String::with_capacity(TOKEN_PREFIX.len() + SECRET_CHARS));
    token.push_str(TOKEN_PREFIX);
    URL_SAFE_NO_PAD.encode_string(&*bytes, &mut *token);

    PlaintextToken(token)
}

/// SHA-256 of the plaintext, hex-encoded. No salt: inputs are high-entropy
/// and unique, and the digest must be reproducible for lookups.
pub fn digest(plaintext: &str) -> TokenDigest {
    TokenDigest(hex::encode(Sha256::digest(plaintext.as_bytes())))
}

/// Cheap shape check done before any storage access.
pub fn has_token_shape(candidate: &str) -> bool {
    candidate.len() > TOKEN_PREFIX.len() && candidate.starts_with(TOKEN_PREFIX)
}

/// A persisted validity window. Never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRecord {
    pub digest: TokenDigest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// The expiry instant itself already counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
