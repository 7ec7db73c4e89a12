//! Login recorder. Writes who used which token, from where and when,
//! synchronously, before the request is allowed to proceed.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

use crate::models::login::NewLogin;
use crate::models::token::TokenDigest;
use crate::store::{CredentialStore, StoreError};

pub const UNKNOWN_USER_AGENT: &str = "Unknown";
pub const MAX_USER_AGENT_LEN: usize = 200;

/// Client address as seen by the transport. `X-Forwarded-For` is honoured
/// only when the operator opted in, and then only its first hop.
pub fn client_ip(peer: SocketAddr, headers: &HeaderMap, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|v| v.parse::<std::net::IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

/// Raw user agent, capped in length. A missing or unreadable header is
/// recorded as "Unknown" and never fails the request.
pub fn user_agent(headers: &HeaderMap) -> String {
    let raw = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match raw {
        Some(ua) => ua.chars().take(MAX_USER_AGENT_LEN).collect(),
        None => UNKNOWN_USER_AGENT.to_string(),
    }
}

/// Append a login record for an already-admitted token.
pub async fn record_login(
    store: &dyn CredentialStore,
    digest: &TokenDigest,
    ip_address: String,
    user_agent: String,
    at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let login = NewLogin {
        token_digest: digest.clone(),
        ip_address,
        user_agent,
        timestamp: at,
    };

    let id = store.record_login(&login).await.map_err(|e| {
        tracing::error!(token = %digest.short(), "failed to write login record: {}", e);
        e
    })?;

    tracing::debug!(token = %digest.short(), login_id = id, "login recorded");
    Ok(id)
}
