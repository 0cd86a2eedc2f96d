//! escola-server – entry point.
//!
//! Startup order:
//! 1. Parse the command line and configuration from environment variables.
//! 2. Initialise tracing (JSON or pretty on stdout, optional rolling file).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Either issue an API token and exit, or build the Axum router and serve
//!    until SIGINT/SIGTERM.

mod config;
mod entities;
mod error;
mod extract;
mod middleware;
mod routes;
mod schemas;
mod state;
mod throttle;
mod versioning;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::entities::{SqliteStore, TokenStore};
use crate::state::AppState;

/// How often idle throttle buckets are dropped.
const THROTTLE_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Parser)]
#[command(name = "escola-server", version, about = "School administration REST service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Issue an API token for `username`, replacing any previous one, and
    /// print it. Only its hash is stored.
    CreateToken { username: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    let _log_guard = init_tracing(&cfg);

    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    match cli.command.unwrap_or(Command::Serve) {
        Command::CreateToken { username } => {
            let token = store.issue_token(&username).await?;
            info!(%username, "api token issued");
            println!("{token}");
            store.close().await;
            Ok(())
        }
        Command::Serve => serve(cfg, store).await,
    }
}

async fn serve(cfg: Config, store: SqliteStore) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        default_permission = %cfg.default_permission,
        user_rate = %cfg.user_rate,
        matricula_anon_rate = %cfg.matricula_anon_rate,
        page_size = cfg.page_size,
        "escola-server starting"
    );
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState::new(cfg, store));

    let throttle = Arc::clone(&state.matricula_throttle);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(THROTTLE_PURGE_INTERVAL);
        loop {
            tick.tick().await;
            throttle.purge_expired(Instant::now());
        }
    });

    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.store.close().await;
    info!("escola-server stopped");
    Ok(())
}

/// Install the global subscriber. The returned guard flushes the log file on
/// drop and must live as long as `main`.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ESCOLA_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let json = cfg.log_json.then(|| fmt::layer().json().with_target(true));
    let pretty = (!cfg.log_json).then(|| fmt::layer().with_target(true).with_thread_ids(true));

    let (file, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "escola-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .with(file)
        .init();
    guard
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["escola-server"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn create_token_takes_a_username() {
        let cli = Cli::try_parse_from(["escola-server", "create-token", "secretaria"]).unwrap();
        match cli.command {
            Some(Command::CreateToken { username }) => assert_eq!(username, "secretaria"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
