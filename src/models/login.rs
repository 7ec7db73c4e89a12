use chrono::{DateTime, Utc};
use serde::Serialize;

use super::token::TokenDigest;

/// One audit entry: which token was used, from where, and when.
/// Carries nothing about what the token was used for.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRecord {
    pub id: i64,
    pub token_digest: TokenDigest,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLogin {
    pub token_digest: TokenDigest,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}
