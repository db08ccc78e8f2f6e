//! Dialplan service
//!
//! Serves dialplan resolution and route/dialplan administration over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use rvoip_dialplan_core::api::create_router;
use rvoip_dialplan_core::identity::HttpIdentityClient;
use rvoip_dialplan_core::logging::{setup_logging, LoggingConfig};
use rvoip_dialplan_core::{DialplanConfig, DialplanStore, InMemoryDialplanStore, PostgresDialplanStore};

#[derive(Parser, Debug)]
#[command(name = "dialplan-service", version, about = "Inbound dialplan resolution service")]
struct Args {
    /// TOML configuration file; DIALPLAN__* environment variables override it
    #[arg(short, long, env = "DIALPLAN_CONFIG")]
    config: Option<PathBuf>,

    /// Keep routes and dialplans in memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override the log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DialplanConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(bind) = args.bind {
        config.http_bind_address = bind.to_string();
    }

    setup_logging(&LoggingConfig::from_config(&config)?)?;

    let store: Arc<dyn DialplanStore> = if args.in_memory {
        warn!("🧪 using in-memory store, data will not survive a restart");
        Arc::new(InMemoryDialplanStore::with_reserved_plans(&config.resolution))
    } else {
        info!("🗄️ connecting to PostgreSQL");
        let store = PostgresDialplanStore::connect(&config)
            .await
            .context("failed to connect to PostgreSQL")?;
        store
            .migrate(&config.resolution)
            .await
            .context("failed to prepare database schema")?;
        Arc::new(store)
    };
    store.health_check().await.context("dialplan store health check failed")?;
    info!("✅ dialplan store ready");

    let identity = HttpIdentityClient::new(config.identity_service_url.clone(), config.identity_timeout())?;
    info!(url = %config.identity_service_url, "identity service client configured");

    let state = rvoip_dialplan_core::init(&config, store, Arc::new(identity));
    let app = create_router(state);

    let listener = TcpListener::bind(&config.http_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_address))?;
    info!(address = %config.http_bind_address, "🚀 dialplan service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("👋 dialplan service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
