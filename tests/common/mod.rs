//! Shared fixtures: a full router over an on-disk SQLite store, a manual
//! clock, and a counting wrapper around the store.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tower::ServiceExt;

use gateway::config::Config;
use gateway::issuance;
use gateway::models::clock::ManualClock;
use gateway::models::login::NewLogin;
use gateway::models::search::{SearchResponse, SearchResult};
use gateway::models::token::{PlaintextToken, TokenDigest, TokenRecord};
use gateway::proxy::upstream::{BackendError, SearchBackend, SearxClient};
use gateway::store::sqlite::SqliteStore;
use gateway::store::{CredentialStore, StoreError};
use gateway::{build_router, AppState};

pub const PEER_IP: [u8; 4] = [203, 0, 113, 7];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

/// Delegates to SQLite while counting every call.
pub struct CountingStore {
    inner: SqliteStore,
    pub lookups: AtomicUsize,
    pub logins: AtomicUsize,
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn issue(
        &self,
        digest: &TokenDigest,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<TokenRecord, StoreError> {
        self.inner.issue(digest, issued_at, ttl).await
    }

    async fn lookup(&self, digest: &TokenDigest) -> Result<Option<TokenRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(digest).await
    }

    async fn revoke(&self, digest: &TokenDigest) -> Result<bool, StoreError> {
        self.inner.revoke(digest).await
    }

    async fn record_login(&self, login: &NewLogin) -> Result<i64, StoreError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.inner.record_login(login).await
    }
}

/// Backend that answers every query with the same results and counts calls.
pub struct StaticBackend {
    pub calls: AtomicUsize,
    pub response: SearchResponse,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: SearchResponse {
                results: vec![SearchResult {
                    title: "Example Domain".into(),
                    url: "https://example.com/".into(),
                    content: "This domain is for use in illustrative examples.".into(),
                    engine: Some("static".into()),
                }],
                suggestions: vec![],
            },
        }
    }
}

#[async_trait]
impl SearchBackend for StaticBackend {
    async fn search(&self, _query: &str) -> Result<SearchResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

pub struct TestGateway {
    pub dir: tempfile::TempDir,
    pub sqlite: SqliteStore,
    pub store: Arc<CountingStore>,
    pub clock: ManualClock,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestGateway {
    pub async fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self::with_config(backend, Config::default()).await
    }

    pub async fn with_searx(uri: &str, timeout: StdDuration) -> Self {
        let backend = SearxClient::new(uri, timeout).unwrap();
        Self::new(Arc::new(backend)).await
    }

    pub async fn with_config(backend: Arc<dyn SearchBackend>, config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteStore::open(&dir.path().join("d2d.db"), StdDuration::from_secs(5))
            .await
            .unwrap();
        sqlite.migrate().await.unwrap();

        let store = Arc::new(CountingStore {
            inner: sqlite.clone(),
            lookups: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
        });
        let clock = ManualClock::new(t0());

        let state = Arc::new(AppState {
            store: store.clone(),
            backend,
            clock: Arc::new(clock.clone()),
            config,
        });
        let router = build_router(state)
            .layer(MockConnectInfo(SocketAddr::from((PEER_IP, 40000))));

        Self {
            dir,
            sqlite,
            store,
            clock,
            router,
        }
    }

    /// Issue a token through the operator path, at the current test time.
    pub async fn issue(&self, ttl: Duration) -> PlaintextToken {
        let (plaintext, _) = issuance::generate_token(self.store.as_ref(), &self.clock, ttl)
            .await
            .unwrap();
        plaintext
    }

    pub async fn get(&self, uri: &str, user_agent: Option<&str>) -> TestResponse {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(ua) = user_agent {
            req = req.header("user-agent", ua);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    pub fn lookups(&self) -> usize {
        self.store.lookups.load(Ordering::SeqCst)
    }

    pub fn logins_written(&self) -> usize {
        self.store.logins.load(Ordering::SeqCst)
    }

    /// Every value in every table, including the schema and migration log.
    pub async fn dump_store(&self) -> String {
        let pool = self.sqlite.pool();
        let mut out = String::new();

        let schema: Vec<(String, String)> =
            sqlx::query_as("SELECT name, COALESCE(sql, '') FROM sqlite_master")
                .fetch_all(pool)
                .await
                .unwrap();
        for (name, sql) in &schema {
            out.push_str(name);
            out.push('\n');
            out.push_str(sql);
            out.push('\n');
        }

        let tokens: Vec<(String, String, String)> =
            sqlx::query_as("SELECT digest, created_at, expires_at FROM token_records")
                .fetch_all(pool)
                .await
                .unwrap();
        for row in tokens {
            out.push_str(&format!("{:?}\n", row));
        }

        let logins: Vec<(i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, token_digest, ip_address, user_agent, timestamp FROM login_records",
        )
        .fetch_all(pool)
        .await
        .unwrap();
        for row in logins {
            out.push_str(&format!("{:?}\n", row));
        }

        out
    }

    /// Raw bytes of the database file and its WAL/SHM side files.
    pub fn raw_db_bytes(&self) -> Vec<u8> {
        let base: PathBuf = self.dir.path().join("d2d.db");
        let mut bytes = Vec::new();
        for suffix in ["", "-wal", "-shm"] {
            let path = PathBuf::from(format!("{}{}", base.display(), suffix));
            if let Ok(b) = std::fs::read(&path) {
                bytes.extend_from_slice(&b);
            }
        }
        bytes
    }
}

/// Build `/path?token=..&q=..` with proper form encoding.
pub fn search_uri(path: &str, token: Option<&str>, q: Option<&str>) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    if let Some(t) = token {
        ser.append_pair("token", t);
    }
    if let Some(q) = q {
        ser.append_pair("q", q);
    }
    let query = ser.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
