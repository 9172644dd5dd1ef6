//! `nexus-gateway stop` — signals a running instance by PID file and waits
//! for it to exit, escalating to SIGKILL if `--force` and the graceful
//! window elapses.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::pid::PidFile;

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGCONT).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

pub async fn execute(pid_file: Option<PathBuf>, force: bool, timeout: u64) -> Result<()> {
    let pid = PidFile::read(pid_file)?;

    #[cfg(unix)]
    {
        use nexus_gateway::signals;
        use tokio::signal::unix::SignalKind;

        signals::send(pid, SignalKind::terminate())?;
        info!(pid, "sent SIGTERM, waiting for shutdown");

        let deadline = Duration::from_secs(timeout);
        let poll_interval = Duration::from_millis(200);
        let mut waited = Duration::ZERO;

        while process_alive(pid) && waited < deadline {
            sleep(poll_interval).await;
            waited += poll_interval;
        }

        if process_alive(pid) {
            if force {
                warn!(pid, "process still running after {timeout}s, sending SIGKILL");
                signals::send(pid, SignalKind::from_raw(nix::libc::SIGKILL))?;
            } else {
                bail!("gateway (PID {pid}) did not stop within {timeout}s; rerun with --force to SIGKILL");
            }
        } else {
            info!(pid, "gateway stopped");
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (pid, force, timeout);
        bail!("stop is only supported on unix platforms");
    }

    Ok(())
}
