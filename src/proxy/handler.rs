use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::middleware::sanitize::{self, QueryViolation};
use crate::middleware::{audit, auth};
use crate::render;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub token: Option<String>,
    pub q: Option<String>,
}

/// `GET /` and `GET /search`.
///
/// RECEIVED -> AUTHENTICATING -> (REJECTED | AUTHENTICATED -> FORWARDING ->
/// (RESPONDED | BACKEND_FAILED)). The login record is written before
/// forwarding and stands regardless of what happens afterwards.
///
/// The span records neither the token nor the query.
#[tracing::instrument(name = "search", skip_all)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let start = Instant::now();

    // -- 1. Parse --
    // An unparseable query string is reported only after authentication, so
    // callers without a valid token always see 401. Only the header token
    // is available in that case.
    let (params, unparseable) = match params {
        Ok(Query(params)) => (params, false),
        Err(_) => (SearchParams::default(), true),
    };
    let token = auth::extract_token(params.token.as_deref(), &headers);

    if !unparseable && token.is_none() && params.q.is_none() {
        return Ok(Html(render::landing_page(state.config.purchase_url.as_deref())).into_response());
    }

    // -- 2. Authenticate --
    let now = state.clock.now();
    let verdict = auth::verify(state.store.as_ref(), token.as_deref(), now).await?;
    let outcome = verdict.label();
    let digest = verdict.into_admission().map_err(|e| {
        tracing::info!(outcome, "access denied");
        e
    })?;
    // Admission implies a token was presented.
    let token = token.unwrap_or_default();

    // -- 3. Record login --
    audit::record_login(
        state.store.as_ref(),
        &digest,
        audit::client_ip(peer, &headers, state.config.trust_forwarded_for),
        audit::user_agent(&headers),
        now,
    )
    .await?;

    if unparseable {
        return Err(QueryViolation::Unparseable.into());
    }

    let Some(raw_query) = params.q else {
        tracing::info!(token = %digest.short(), "login");
        return Ok(Html(render::search_page(&token)).into_response());
    };

    // -- 4. Forward --
    let query = sanitize::sanitize_query(&raw_query, state.config.max_query_len)?;
    let results = state.backend.search(query).await?;

    tracing::info!(
        token = %digest.short(),
        results = results.results.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "search forwarded"
    );

    // -- 5. Render --
    Ok(Html(render::results_page(&token, query, &results)).into_response())
}

/// `GET /health`. Liveness only: touches neither the store nor the backend.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
