//! Shutdown signal plumbing (SPEC_FULL §11's graceful-shutdown rule):
//! SIGTERM/SIGINT broadcast a single `()` to every subscriber — the token
//! refresh loop, the axum graceful-shutdown future — so in-flight requests
//! drain and the background loop exits instead of being aborted. SIGHUP
//! drives the `reload` CLI command (SPEC_FULL §10.4): it doesn't shut
//! anything down, it just re-reads the route table and rebuilds the token
//! cache in place.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::router::Router;
use crate::store::Store;
use crate::token_manager::TokenManager;

pub fn install() -> broadcast::Sender<()> {
    let (tx, _) = broadcast::channel(16);

    #[cfg(unix)]
    {
        let tx_clone = tx.clone();
        tokio::spawn(async move {
            let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
                _ = sigint.recv() => info!("SIGINT received, shutting down"),
            }
            let _ = tx_clone.send(());
        });
    }

    #[cfg(not(unix))]
    {
        let tx_clone = tx.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl+C received, shutting down");
            let _ = tx_clone.send(());
        });
    }

    tx
}

/// Spawns a SIGHUP listener that reloads the route table and token cache
/// in place. A no-op on non-Unix targets, same as `send`'s reload path.
#[cfg(unix)]
pub fn install_reload(router: Arc<Router>, store: Arc<Store>, token_manager: Arc<TokenManager>) {
    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to install SIGHUP handler: {e}");
                return;
            }
        };

        loop {
            if sighup.recv().await.is_none() {
                return;
            }
            info!("SIGHUP received, reloading route table and token cache");
            if let Err(e) = router.reload(&store).await {
                warn!("reload: failed to refresh route table: {e}");
            }
            if let Err(e) = token_manager.rebuild_cache().await {
                warn!("reload: failed to rebuild token cache: {e}");
            }
        }
    });
}

#[cfg(not(unix))]
pub fn install_reload(_router: Arc<Router>, _store: Arc<Store>, _token_manager: Arc<TokenManager>) {}

#[cfg(unix)]
pub fn send(pid: u32, kind: SignalKind) -> anyhow::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let signal = match kind.as_raw_value() {
        v if v == nix::libc::SIGTERM => Signal::SIGTERM,
        v if v == nix::libc::SIGINT => Signal::SIGINT,
        v if v == nix::libc::SIGHUP => Signal::SIGHUP,
        v if v == nix::libc::SIGKILL => Signal::SIGKILL,
        _ => anyhow::bail!("unsupported signal"),
    };
    kill(Pid::from_raw(pid as i32), signal).map_err(|e| anyhow::anyhow!("failed to signal pid {pid}: {e}"))
}

#[cfg(not(unix))]
pub fn send(_pid: u32, _kind: ()) -> anyhow::Result<()> {
    anyhow::bail!("signal sending is not supported on this platform")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let tx = broadcast::channel::<()>(4).0;
        let mut a = tx.subscribe();
        let mut b = tx.subscribe();
        tx.send(()).unwrap();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
