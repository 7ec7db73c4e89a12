//! Death2Data gateway library.
//!
//! Verifies bearer tokens against stored digests, records each login, and
//! forwards the caller's query to a SearXNG backend. The query itself is
//! never written anywhere: there is no table, log field or span for it.

use std::sync::Arc;

use axum::extract::Request;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub mod cli;
pub mod config;
pub mod errors;
pub mod issuance;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod render;
pub mod store;

use models::clock::Clock;
use proxy::upstream::SearchBackend;
use store::CredentialStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub backend: Arc<dyn SearchBackend>,
    pub clock: Arc<dyn Clock>,
    pub config: config::Config,
}

/// Route table plus the response-wide layers.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// search route reads the peer address for the login record.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(proxy::handler::search_handler))
        .route("/search", get(proxy::handler::search_handler))
        .route("/health", get(proxy::handler::health))
        .fallback(proxy::handler::not_found)
        .with_state(state)
        // Span carries method and path only. The URI query holds the token
        // and the search terms.
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!("http", method = %req.method(), path = %req.uri().path())
        }))
        .layer(axum::middleware::from_fn(
            middleware::headers::request_id_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::headers::security_headers_middleware,
        ))
}
