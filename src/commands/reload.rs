//! `nexus-gateway reload` — sends SIGHUP to a running instance, which
//! re-reads the route table and rebuilds the token cache in place without
//! dropping any in-flight connections (see `signals::install_reload`).

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::pid::PidFile;

pub async fn execute(pid_file: Option<PathBuf>) -> Result<()> {
    let pid = PidFile::read(pid_file)?;

    #[cfg(unix)]
    {
        use nexus_gateway::signals;
        use tokio::signal::unix::SignalKind;

        signals::send(pid, SignalKind::hangup())?;
        info!(pid, "sent SIGHUP");
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        anyhow::bail!("reload is only supported on unix platforms");
    }

    Ok(())
}
