//! # tagcast-watch
//!
//! Command-line subscriber: connects to the real-time server, logs every
//! invalidation, and shows debounced toasts through the log.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tagcast_client::{LogNotifier, MemoryQueryCache, Subscriber, SubscriberConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// tagcast invalidation watcher.
#[derive(Parser, Debug)]
#[command(name = "tagcast-watch", about = "Print invalidations pushed by a tagcast site")]
struct Cli {
    /// WebSocket URL (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Bootstrap URL hit before each connect (overrides settings).
    #[arg(long, conflicts_with = "no_bootstrap")]
    bootstrap_url: Option<String>,

    /// Connect directly without calling the bootstrap route.
    #[arg(long)]
    no_bootstrap: bool,

    /// Toast debounce window in milliseconds (overrides settings).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Log level (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = tagcast_settings::get_settings();
    tagcast_core::logging::init_subscriber(
        args.log_level.as_deref().unwrap_or(&settings.logging.level),
    );

    let mut config = SubscriberConfig::from(&settings.client);
    if let Some(url) = args.url {
        config.url = url;
    }
    if args.no_bootstrap {
        config.bootstrap_url = None;
    } else if let Some(url) = args.bootstrap_url {
        config.bootstrap_url = Some(url);
    }
    if let Some(ms) = args.debounce_ms {
        config.toast_debounce = Duration::from_millis(ms);
    }

    let handle = Subscriber::new(config, Arc::new(MemoryQueryCache::new()), Arc::new(LogNotifier))
        .context("Failed to create subscriber")?
        .spawn();
    let mut events = handle.events();
    let mut state = handle.state();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    let tags: Vec<String> = message.tags.iter().map(ToString::to_string).collect();
                    info!(tags = %tags.join(","), message = message.toast().unwrap_or(""), "invalidate");
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(state = ?*state.borrow_and_update(), "connection state");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    info!("watcher stopped");
    Ok(())
}
