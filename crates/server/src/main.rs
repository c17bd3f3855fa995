use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use gatehouse_appconfig::{AgentClient, Refresher};
use gatehouse_core::{PathClassifier, SnapshotHandle};
use gatehouse_proxy::{AppState, ProxyConfig, router};
use gatehouse_server::{EffectiveConfig, Environ, ServerError};

/// Gatehouse authorising reverse proxy sidecar.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", about = "Authorising reverse proxy sidecar")]
struct Cli {
    /// Override the listen port (otherwise `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind on.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize tracing from RUST_LOG, falling back to LOG_LEVEL (resolved
    // through the per-environment overlay when possible), then to info. The
    // subscriber must exist before configuration errors are reported.
    let fallback = Environ::from_process()
        .map_or_else(|_| "info".to_owned(), |env| env.get_or("LOG_LEVEL", "info"));
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "gatehouse failed to start");
            Err(e)
        }
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let environ = Environ::from_process()?;
    let config = EffectiveConfig::load(&environ)?;
    info!(
        environment = %config.environment,
        origin = %config.origin_host,
        proto = %config.origin_proto,
        profiles = config.profiles.len(),
        "configuration loaded"
    );

    // First refresh runs synchronously: the proxy must not serve before at
    // least one usable profile has produced a snapshot.
    let snapshots = Arc::new(SnapshotHandle::new());
    let agent = AgentClient::new(config.agent_url.clone(), config.fetch_timeout)?;
    let refresher = Refresher::new(
        agent,
        config.profiles.clone(),
        Arc::clone(&snapshots),
        config.refresh_interval,
    );
    refresher.initial_refresh().await?;
    let _refresh_handle = refresher.spawn();

    let classifier = PathClassifier::new(
        config.filter_enabled,
        config.public_paths.clone(),
        config.protected_paths.clone(),
    );
    let state = AppState::new(
        ProxyConfig {
            origin_authority: config.origin_host.clone(),
            origin_scheme: config.origin_proto.clone(),
            xff_index: config.xff_index,
            contact_email: config.contact_email.clone(),
            contact_email_label: config.contact_email_label.clone(),
            connect_timeout: config.origin_connect_timeout,
            read_timeout: config.origin_read_timeout,
        },
        classifier,
        snapshots,
    );
    let app = router(state);

    // Resolve the bind address (CLI overrides take precedence).
    let port = cli.port.unwrap_or(config.port);
    let addr = format!("{}:{port}", cli.bind);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "gatehouse listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gatehouse shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
