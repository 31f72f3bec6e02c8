//! # tagcast-site
//!
//! Site server: the `/api/socket` bootstrap route that lazily attaches the
//! real-time server, plus demo admin write routes that broadcast
//! invalidations on success.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tagcast::admin::AdminStore;
use tagcast::app::{SiteOptions, site_router};
use tagcast_server::ConnectionRegistry;
use tracing::{info, warn};

/// tagcast site server.
#[derive(Parser, Debug)]
#[command(name = "tagcast-site", about = "Site server with lazy real-time invalidation")]
struct Cli {
    /// Host to bind the site on (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind the site on (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Address the real-time server binds when first requested (overrides settings).
    #[arg(long)]
    realtime_addr: Option<String>,

    /// Attach the real-time server at startup instead of on first bootstrap.
    #[arg(long)]
    eager: bool,

    /// Allow cross-origin requests from any origin.
    #[arg(long)]
    cors: bool,

    /// Log level (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = tagcast_settings::get_settings();

    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    if args.json_logs || settings.logging.json {
        tagcast_core::logging::init_json_subscriber(level);
    } else {
        tagcast_core::logging::init_subscriber(level);
    }

    let metrics = match tagcast_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics recorder not installed, /metrics disabled");
            None
        }
    };

    let registry = ConnectionRegistry::global();
    let realtime_addr = args
        .realtime_addr
        .unwrap_or_else(|| settings.realtime.bind_addr());

    if args.eager {
        let server = registry
            .ensure(&realtime_addr)
            .await
            .context("Failed to attach real-time server")?;
        info!(url = %server.ws_url(), "real-time server attached at startup");
    }

    let app = site_router(SiteOptions {
        registry: Arc::clone(&registry),
        realtime_addr,
        store: Arc::new(AdminStore::seeded()),
        metrics,
        permissive_cors: args.cors,
    });

    let host = args.host.unwrap_or_else(|| settings.site.host.clone());
    let port = args.port.unwrap_or(settings.site.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind site to {addr}"))?;
    info!(addr = %listener.local_addr()?, "site listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Site server failed")?;

    if let Some(server) = registry.current() {
        server.stop(Some(Duration::from_secs(5))).await;
    }
    info!("site stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
