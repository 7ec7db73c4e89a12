use std::path::Path;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use super::{CredentialStore, StoreError};
use crate::models::login::{LoginRecord, NewLogin};
use crate::models::token::{TokenDigest, TokenRecord};

/// Shortest digest prefix accepted by [`SqliteStore::resolve_prefix`].
pub const MIN_PREFIX_LEN: usize = 8;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file in WAL mode.
    /// `timeout` bounds both lock waits and pool checkout.
    pub async fn open(path: &Path, timeout: StdDuration) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Operator Operations --

    /// Resolve a full digest or a unique prefix of one.
    pub async fn resolve_prefix(&self, prefix: &str) -> Result<Option<TokenDigest>, StoreError> {
        if let Some(full) = TokenDigest::from_hex(prefix) {
            return Ok(Some(full));
        }

        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.len() < MIN_PREFIX_LEN || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(None);
        }

        let matches = sqlx::query_scalar::<_, String>(
            "SELECT digest FROM token_records WHERE substr(digest, 1, ?) = ? LIMIT 2",
        )
        .bind(prefix.len() as i64)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        match matches.as_slice() {
            [] => Ok(None),
            [only] => Ok(TokenDigest::from_hex(only)),
            _ => Err(StoreError::AmbiguousPrefix),
        }
    }

    pub async fn list_tokens(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT digest, created_at, expires_at FROM token_records ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TokenRow::into_record).collect()
    }

    /// Most recent first.
    pub async fn recent_logins(&self, limit: i64) -> Result<Vec<LoginRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LoginRow>(
            "SELECT id, token_digest, ip_address, user_agent, timestamp FROM login_records ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LoginRow::into_record).collect()
    }

    /// Delete login records strictly older than `cutoff`.
    pub async fn prune_logins(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM login_records WHERE timestamp < ?")
            .bind(canonical(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn issue(
        &self,
        digest: &TokenDigest,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<TokenRecord, StoreError> {
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(StoreError::TimeOutOfRange)?;
        let record = TokenRecord {
            digest: digest.clone(),
            created_at: issued_at,
            expires_at,
        };

        sqlx::query("INSERT INTO token_records (digest, created_at, expires_at) VALUES (?, ?, ?)")
            .bind(record.digest.as_str())
            .bind(canonical(record.created_at))
            .bind(canonical(record.expires_at))
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StoreError::DuplicateToken
                }
                other => StoreError::Database(other),
            })?;

        Ok(record)
    }

    async fn lookup(&self, digest: &TokenDigest) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT digest, created_at, expires_at FROM token_records WHERE digest = ?",
        )
        .bind(digest.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRow::into_record).transpose()
    }

    async fn revoke(&self, digest: &TokenDigest) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM token_records WHERE digest = ?")
            .bind(digest.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, login: &NewLogin) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO login_records (token_digest, ip_address, user_agent, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(login.token_digest.as_str())
        .bind(&login.ip_address)
        .bind(&login.user_agent)
        .bind(canonical(login.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

// -- Row Types --

#[derive(sqlx::FromRow)]
struct TokenRow {
    digest: String,
    created_at: String,
    expires_at: String,
}

impl TokenRow {
    fn into_record(self) -> Result<TokenRecord, StoreError> {
        Ok(TokenRecord {
            digest: stored_digest(self.digest)?,
            created_at: parse_canonical(&self.created_at)?,
            expires_at: parse_canonical(&self.expires_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: i64,
    token_digest: String,
    ip_address: String,
    user_agent: String,
    timestamp: String,
}

impl LoginRow {
    fn into_record(self) -> Result<LoginRecord, StoreError> {
        Ok(LoginRecord {
            id: self.id,
            token_digest: stored_digest(self.token_digest)?,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: parse_canonical(&self.timestamp)?,
        })
    }
}

fn stored_digest(raw: String) -> Result<TokenDigest, StoreError> {
    TokenDigest::from_hex(&raw).ok_or(StoreError::CorruptDigest)
}

/// RFC 3339, UTC, fixed microsecond precision: sorts lexicographically in
/// time order, which the retention query relies on.
fn canonical(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_canonical(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}
