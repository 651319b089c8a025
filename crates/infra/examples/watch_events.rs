//! Example: Watching account events in real time
//!
//! Loads the client configuration, starts an event stream and prints every
//! event until Ctrl-C.
//!
//! # Setup
//!
//! ```bash
//! export NIMBUS_BASE_URL=https://api.nimbus.dev/2.0/
//! export NIMBUS_ACCESS_TOKEN=<developer token>
//! RUST_LOG=nimbus_infra=debug cargo run --example watch_events
//! ```

use std::sync::Arc;

use anyhow::Context;
use nimbus_domain::Event;
use nimbus_infra::{config, ApiConnection, ApiError, EventListener, EventStream};
use tracing_subscriber::EnvFilter;

struct PrintingListener;

impl EventListener for PrintingListener {
    fn on_event(&self, event: &Event) {
        let source = event.source().map_or("-", |source| source.id.as_str());
        println!("{:<24} {:<20} source={source}", event.id(), event.event_type());
    }

    fn on_exception(&self, error: &ApiError) -> bool {
        eprintln!("stream stopped: {error} ({:?})", error.category());
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::load().context("no usable configuration")?;
    let connection =
        Arc::new(ApiConnection::from_config(&config).context("invalid client configuration")?);

    let stream = EventStream::new(connection);
    stream.add_listener(Arc::new(PrintingListener));
    stream.start().await.context("failed to start the event stream")?;
    println!("Watching events at {} (Ctrl-C to quit)", config.base_url);

    tokio::signal::ctrl_c().await?;
    if stream.is_started() {
        stream.stop()?;
    }
    Ok(())
}
