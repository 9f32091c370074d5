//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGINT via Ctrl-C, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a policy reload, not shutdown

use std::io;

use tokio::sync::mpsc;

use crate::config::ReloadTrigger;
use crate::lifecycle::Shutdown;

#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    async fn recv(&mut self) -> Option<()> {
        self.0.recv().await
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}

/// Forward SIGHUP to `reload_tx` until Ctrl-C, then trigger `shutdown`.
pub async fn handle_signals(
    shutdown: &Shutdown,
    reload_tx: mpsc::UnboundedSender<ReloadTrigger>,
) -> io::Result<()> {
    let mut hangup = Hangup::new()?;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
                return Ok(());
            }
            Some(()) = hangup.recv() => {
                tracing::info!("SIGHUP received, scheduling reload");
                let _ = reload_tx.send(ReloadTrigger::Signal);
            }
        }
    }
}
