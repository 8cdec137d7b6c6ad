//! Termination signals
//!
//! The daemon stops on Ctrl-C or SIGTERM (systemd, docker). A handler that
//! fails to install is logged and ignored; the other signal still works.

use std::future::Future;
use std::io;
use tokio::sync::watch;
use tracing::{error, info};

/// Resolves when the first signal arrives; returns its name.
pub async fn wait_for_signal() -> &'static str {
    first_signal(tokio::signal::ctrl_c(), terminate()).await
}

#[cfg(unix)]
async fn terminate() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> io::Result<()> {
    std::future::pending().await
}

/// Wait for whichever listener fires first.
///
/// A listener that returns an error never counts as a signal.
pub async fn first_signal<I, T>(interrupt: I, terminate: T) -> &'static str
where
    I: Future<Output = io::Result<()>>,
    T: Future<Output = io::Result<()>>,
{
    tokio::select! {
        _ = listen(interrupt, "ctrl_c") => "ctrl_c",
        _ = listen(terminate, "sigterm") => "sigterm",
    }
}

async fn listen<F: Future<Output = io::Result<()>>>(signal: F, name: &'static str) {
    if let Err(e) = signal.await {
        error!(signal = name, error = %e, "signal_handler_failed");
        std::future::pending::<()>().await;
    }
}

/// Spawn a task that flips the returned receiver to `true` on the first signal
pub fn spawn_listener() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal = signal, "shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });
    shutdown_rx
}
