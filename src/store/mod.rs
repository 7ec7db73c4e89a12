use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::login::NewLogin;
use crate::models::token::{TokenDigest, TokenRecord};

pub mod sqlite;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a token with this digest already exists")]
    DuplicateToken,

    #[error("digest prefix matches more than one token")]
    AmbiguousPrefix,

    #[error("timestamp arithmetic out of range")]
    TimeOutOfRange,

    #[error("stored digest is not valid hex")]
    CorruptDigest,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt timestamp in store: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Persistent token validity windows and the login audit trail.
///
/// Writes are insert-only, except `revoke`, which deletes. No row is ever
/// updated in place.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a record expiring at `issued_at + ttl`.
    /// Fails with [`StoreError::DuplicateToken`] rather than overwriting, and
    /// with [`StoreError::TimeOutOfRange`] if the expiry is not representable.
    async fn issue(
        &self,
        digest: &TokenDigest,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<TokenRecord, StoreError>;

    async fn lookup(&self, digest: &TokenDigest) -> Result<Option<TokenRecord>, StoreError>;

    /// Idempotent. Returns whether a record was actually removed.
    async fn revoke(&self, digest: &TokenDigest) -> Result<bool, StoreError>;

    /// Append a login record. Does not re-check token validity.
    async fn record_login(&self, login: &NewLogin) -> Result<i64, StoreError>;
}
