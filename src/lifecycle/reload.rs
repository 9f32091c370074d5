//! Reload worker.
//!
//! Drains reload triggers and rebuilds the published policy. Bursts of
//! triggers (an editor writing a file emits several events) collapse into
//! one rebuild.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::ReloadTrigger;
use crate::module::FilesModule;

/// Run until shutdown or until every trigger sender is gone.
pub async fn run_reloader(
    module: Arc<FilesModule>,
    mut triggers: mpsc::UnboundedReceiver<ReloadTrigger>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let trigger = tokio::select! {
            _ = shutdown.recv() => break,
            trigger = triggers.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };

        let mut coalesced = 0usize;
        while triggers.try_recv().is_ok() {
            coalesced += 1;
        }
        tracing::debug!(trigger = ?trigger, coalesced, "Reloading policy");

        let module = module.clone();
        match tokio::task::spawn_blocking(move || module.reload()).await {
            Ok(Ok(generation)) => tracing::debug!(generation, "Reload complete"),
            // Already logged by the module.
            Ok(Err(_)) => {}
            Err(e) => tracing::error!(error = %e, "Reload task failed"),
        }
    }

    tracing::debug!("Reload worker stopped");
}
