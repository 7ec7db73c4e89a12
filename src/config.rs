use std::path::PathBuf;
use std::time::Duration as StdDuration;

/// Upper bound for `D2D_TOKEN_TTL_DAYS` and `token generate --ttl-days`.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Upper bound for `D2D_LOGIN_RETENTION_DAYS`.
pub const MAX_LOGIN_RETENTION_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the SearXNG instance.
    pub backend_url: String,
    pub database_path: PathBuf,
    /// TTL applied by `token generate` when `--ttl-days` is not given.
    pub token_ttl_days: i64,
    /// Login records older than this are pruned.
    pub login_retention_days: i64,
    pub backend_timeout_secs: u64,
    /// SQLite busy timeout and pool checkout timeout.
    pub store_timeout_secs: u64,
    /// Maximum query length, in characters.
    pub max_query_len: usize,
    /// Take the client IP from `X-Forwarded-For`. Only safe behind a
    /// reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Shown on the landing page when set.
    pub purchase_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            backend_url: "http://localhost:8888".into(),
            database_path: PathBuf::from("./data/d2d.db"),
            token_ttl_days: 28,
            login_retention_days: 90,
            backend_timeout_secs: 10,
            store_timeout_secs: 5,
            max_query_len: 512,
            trust_forwarded_for: false,
            purchase_url: None,
        }
    }
}

impl Config {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_ttl_days)
    }

    pub fn login_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.login_retention_days)
    }

    pub fn backend_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.backend_timeout_secs)
    }

    pub fn store_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.store_timeout_secs)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let defaults = Config::default();

    let backend_url = std::env::var("SEARXNG_URL").unwrap_or(defaults.backend_url);
    let parsed = url::Url::parse(&backend_url)
        .map_err(|e| anyhow::anyhow!("SEARXNG_URL is not a valid URL: {}", e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("SEARXNG_URL must use http or https, got '{}'", parsed.scheme());
    }

    Ok(Config {
        port: env_parse("PORT").unwrap_or(defaults.port),
        backend_url,
        database_path: std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path),
        token_ttl_days: env_days("D2D_TOKEN_TTL_DAYS", MAX_TOKEN_TTL_DAYS)
            .unwrap_or(defaults.token_ttl_days),
        login_retention_days: env_days("D2D_LOGIN_RETENTION_DAYS", MAX_LOGIN_RETENTION_DAYS)
            .unwrap_or(defaults.login_retention_days),
        backend_timeout_secs: env_parse("D2D_BACKEND_TIMEOUT_SECS")
            .filter(|s: &u64| *s > 0)
            .unwrap_or(defaults.backend_timeout_secs),
        store_timeout_secs: env_parse("D2D_STORE_TIMEOUT_SECS")
            .filter(|s: &u64| *s > 0)
            .unwrap_or(defaults.store_timeout_secs),
        max_query_len: env_parse("D2D_MAX_QUERY_LEN")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_query_len),
        trust_forwarded_for: env_parse("D2D_TRUST_FORWARDED_FOR")
            .unwrap_or(defaults.trust_forwarded_for),
        purchase_url: std::env::var("D2D_PURCHASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty()),
    })
}

/// A whole number of days in `1..=max`, as a duration.
pub fn day_span(days: i64, max: i64) -> Option<chrono::Duration> {
    if (1..=max).contains(&days) {
        chrono::Duration::try_days(days)
    } else {
        None
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_days(key: &str, max: i64) -> Option<i64> {
    let days = env_parse::<i64>(key)?;
    if day_span(days, max).is_some() {
        Some(days)
    } else {
        tracing::warn!(key, days, max, "ignoring out-of-range value, using default");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.token_ttl(), chrono::Duration::days(28));
        assert_eq!(cfg.login_retention(), chrono::Duration::days(90));
        assert_eq!(cfg.backend_timeout(), StdDuration::from_secs(10));
        assert!(!cfg.trust_forwarded_for);
    }

    #[test]
    fn test_day_span_bounds() {
        assert_eq!(day_span(1, MAX_TOKEN_TTL_DAYS), Some(chrono::Duration::days(1)));
        assert_eq!(
            day_span(MAX_TOKEN_TTL_DAYS, MAX_TOKEN_TTL_DAYS),
            Some(chrono::Duration::days(MAX_TOKEN_TTL_DAYS))
        );
        assert_eq!(day_span(0, MAX_TOKEN_TTL_DAYS), None);
        assert_eq!(day_span(-5, MAX_TOKEN_TTL_DAYS), None);
        assert_eq!(day_span(MAX_TOKEN_TTL_DAYS + 1, MAX_TOKEN_TTL_DAYS), None);
        assert_eq!(day_span(i64::MAX, i64::MAX), None);
    }

    #[test]
    fn test_env_days_rejects_overflowing_retention() {
        std::env::set_var("D2D_TEST_ENV_DAYS", "1000000000");
        assert_eq!(env_days("D2D_TEST_ENV_DAYS", MAX_LOGIN_RETENTION_DAYS), None);
        std::env::set_var("D2D_TEST_ENV_DAYS", "365");
        assert_eq!(env_days("D2D_TEST_ENV_DAYS", MAX_LOGIN_RETENTION_DAYS), Some(365));
        std::env::remove_var("D2D_TEST_ENV_DAYS");
    }

    #[test]
    fn test_env_parse_ignores_garbage() {
        std::env::set_var("D2D_TEST_ENV_PARSE", "not-a-number");
        assert_eq!(env_parse::<u16>("D2D_TEST_ENV_PARSE"), None);
        std::env::set_var("D2D_TEST_ENV_PARSE", " 42 ");
        assert_eq!(env_parse::<u16>("D2D_TEST_ENV_PARSE"), Some(42));
        std::env::remove_var("D2D_TEST_ENV_PARSE");
    }
}
