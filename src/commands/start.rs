//! `nexus-gateway start` — the only command that actually runs the server.

use std::path::PathBuf;

use anyhow::Result;
use nexus_gateway::config::Config;
use nexus_gateway::{init_tracing, server};
use tracing::info;

use crate::daemon::{daemonize, DaemonConfig};
use crate::pid::PidFile;

pub async fn execute(daemon: bool, pid_file: Option<PathBuf>, config: Config) -> Result<()> {
    if daemon {
        daemonize(DaemonConfig::default())?;
    }

    // Deferred until after a possible fork so the subscriber's file
    // descriptors point at the daemon's redirected stdout/stderr.
    init_tracing();

    let _pid_guard = PidFile::create(pid_file)?;
    info!(daemon, "nexus-gateway starting");

    server::run(config).await
}
