use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use gateway::cli::{self, Commands, LoginCommands, TokenCommands};
use gateway::config::{self, Config};
use gateway::issuance::{self, RevokeOutcome};
use gateway::jobs;
use gateway::models::clock::{Clock, SystemClock};
use gateway::proxy::upstream::SearxClient;
use gateway::store::sqlite::SqliteStore;
use gateway::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing()?;

    let cfg = config::load()?;

    let result = match args.command {
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Token { command }) => handle_token_command(command, &cfg).await,
        Some(Commands::Logins { command }) => handle_login_command(command, &cfg).await,
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    opentelemetry::global::shutdown_tracer_provider();
    result
}

/// Logs go to stderr so operator commands can print to stdout cleanly.
/// OTLP export is enabled only when OTEL_EXPORTER_OTLP_ENDPOINT is set.
fn init_tracing() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "d2d-gateway"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let fmt_layer = if std::env::var("D2D_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=info,d2d=info,tower_http=info".into()),
        ))
        .with(fmt_layer)
        .with(telemetry_layer)
        .init();

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(&cfg.database_path, cfg.store_timeout())
        .await
        .with_context(|| format!("failed to open database at {}", cfg.database_path.display()))?;
    store.migrate().await?;
    Ok(store)
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);

    tracing::info!("Opening credential store...");
    let store = open_store(&cfg).await?;

    let backend = SearxClient::new(&cfg.backend_url, cfg.backend_timeout())
        .context("invalid search backend URL")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    jobs::cleanup::spawn(store.clone(), clock.clone(), cfg.login_retention());
    tracing::info!(
        retention_days = cfg.login_retention_days,
        "Background login cleanup job started (hourly)"
    );

    let backend_endpoint = backend.endpoint().to_string();
    let state = Arc::new(AppState {
        store: Arc::new(store),
        backend: Arc::new(backend),
        clock,
        config: cfg,
    });

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, backend = %backend_endpoint, "Death2Data gateway listening");
    tracing::info!("Recording logins (token digest, IP, user agent, time). Search queries are never stored.");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn handle_token_command(cmd: TokenCommands, cfg: &Config) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;

    match cmd {
        TokenCommands::Generate { ttl_days } => {
            let ttl = match ttl_days {
                Some(days) => config::day_span(days, config::MAX_TOKEN_TTL_DAYS).with_context(|| {
                    format!(
                        "--ttl-days must be between 1 and {}, got {}",
                        config::MAX_TOKEN_TTL_DAYS,
                        days
                    )
                })?,
                None => cfg.token_ttl(),
            };

            let (plaintext, record) = issuance::generate_token(&store, &SystemClock, ttl).await?;
            println!();
            println!("Token:   {}", plaintext.expose());
            println!("Hash:    {}", record.digest);
            println!("Expires: {}", record.expires_at.format("%Y-%m-%d %H:%M UTC"));
            println!();
            println!("Give the token to the user. Only the hash was stored.");
            println!();
        }
        TokenCommands::Revoke { digest } => match issuance::revoke_token(&store, &digest).await? {
            RevokeOutcome::Revoked(d) => println!("Token {} revoked.", d.short()),
            RevokeOutcome::NotFound => println!("No token matches '{}'.", digest),
        },
        TokenCommands::List => {
            let tokens = store.list_tokens().await?;
            if tokens.is_empty() {
                println!("No tokens found.");
            } else {
                let now = chrono::Utc::now();
                println!("{:<14} {:<18} {:<18} {:<8}", "DIGEST", "CREATED", "EXPIRES", "STATUS");
                for t in tokens {
                    println!(
                        "{:<14} {:<18} {:<18} {:<8}",
                        t.digest.short(),
                        t.created_at.format("%Y-%m-%d %H:%M"),
                        t.expires_at.format("%Y-%m-%d %H:%M"),
                        if t.is_expired_at(now) { "expired" } else { "valid" }
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_login_command(cmd: LoginCommands, cfg: &Config) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;

    match cmd {
        LoginCommands::Show { limit } => {
            let logins = store.recent_logins(limit.max(1)).await?;
            println!();
            println!("Recent logins (WHO, not WHAT):");
            println!();
            if logins.is_empty() {
                println!("  No logins recorded.");
            }
            for l in logins {
                let ua: String = l.user_agent.chars().take(40).collect();
                println!(
                    "  {} | {:<39} | {}... | {}",
                    l.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    l.ip_address,
                    &l.token_digest.as_str()[..16],
                    ua
                );
            }
            println!();
        }
        LoginCommands::Prune => {
            let removed =
                jobs::cleanup::prune_once(&store, chrono::Utc::now(), cfg.login_retention()).await?;
            println!(
                "Removed {} login record(s) older than {} days.",
                removed, cfg.login_retention_days
            );
        }
    }
    Ok(())
}
