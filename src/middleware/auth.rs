//! Access verification for a single request.
//!
//! `PRESENTED -> {MALFORMED, UNKNOWN, EXPIRED, VALID}`. Re-run on every
//! request against current stored state; nothing is cached between requests,
//! so a revocation takes effect on the very next lookup.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::token::{self, TokenDigest};
use crate::store::{CredentialStore, StoreError};

/// Anything longer cannot be a token we issued.
const MAX_TOKEN_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Malformed,
    Unknown,
    Expired,
    Valid(TokenDigest),
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Malformed => "malformed",
            Verdict::Unknown => "unknown",
            Verdict::Expired => "expired",
            Verdict::Valid(_) => "valid",
        }
    }

    /// Admission yields the digest needed for login recording.
    pub fn into_admission(self) -> Result<TokenDigest, AppError> {
        match self {
            Verdict::Valid(digest) => Ok(digest),
            Verdict::Malformed => Err(AppError::MalformedToken),
            Verdict::Unknown | Verdict::Expired => Err(AppError::AccessDenied),
        }
    }
}

/// Pull the presented token from the `token` query parameter, falling back
/// to an `Authorization: Bearer` header.
pub fn extract_token(query_param: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(t) = query_param.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(t.to_string());
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Decide admission for a presented token at instant `now`.
///
/// Malformed input is rejected before the store is touched.
pub async fn verify(
    store: &dyn CredentialStore,
    presented: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Verdict, StoreError> {
    let Some(presented) = presented else {
        return Ok(Verdict::Malformed);
    };
    if presented.len() > MAX_TOKEN_LEN || !token::has_token_shape(presented) {
        return Ok(Verdict::Malformed);
    }

    let digest = token::digest(presented);
    let verdict = match store.lookup(&digest).await? {
        None => Verdict::Unknown,
        Some(record) if record.is_expired_at(now) => Verdict::Expired,
        Some(_) => Verdict::Valid(digest),
    };
    Ok(verdict)
}
