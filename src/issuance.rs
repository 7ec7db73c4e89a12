//! Operator-side token lifecycle: issue and revoke.

use chrono::Duration;

use crate::models::clock::Clock;
use crate::models::token::{self, PlaintextToken, TokenDigest, TokenRecord};
use crate::store::sqlite::SqliteStore;
use crate::store::{CredentialStore, StoreError};

/// Collisions are astronomically unlikely; a handful of retries is plenty.
pub const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Generate a token, persist only its digest, and hand back the plaintext.
/// A digest collision regenerates; an existing record is never overwritten.
pub async fn generate_token(
    store: &dyn CredentialStore,
    clock: &dyn Clock,
    ttl: Duration,
) -> Result<(PlaintextToken, TokenRecord), StoreError> {
    let mut attempt = 1;
    loop {
        let plaintext = token::generate();
        match store.issue(&plaintext.digest(), clock.now(), ttl).await {
            Ok(record) => {
                tracing::info!(token = %record.digest.short(), expires_at = %record.expires_at, "token issued");
                return Ok((plaintext, record));
            }
            Err(StoreError::DuplicateToken) if attempt < MAX_ISSUE_ATTEMPTS => {
                tracing::warn!(attempt, "digest collision at issuance, regenerating");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked(TokenDigest),
    /// Nothing matched; revocation is idempotent so this is not an error.
    NotFound,
}

/// Revoke by full digest or by a unique prefix of at least
/// [`crate::store::sqlite::MIN_PREFIX_LEN`] hex characters.
pub async fn revoke_token(
    store: &SqliteStore,
    digest_or_prefix: &str,
) -> Result<RevokeOutcome, StoreError> {
    let Some(digest) = store.resolve_prefix(digest_or_prefix).await? else {
        return Ok(RevokeOutcome::NotFound);
    };

    if store.revoke(&digest).await? {
        tracing::info!(token = %digest.short(), "token revoked");
        Ok(RevokeOutcome::Revoked(digest))
    } else {
        Ok(RevokeOutcome::NotFound)
    }
}
