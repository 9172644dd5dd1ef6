pub mod auth;
pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod oauth;
pub mod router;
pub mod server;
pub mod signals;
pub mod store;
pub mod token_manager;
pub mod upstream;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
