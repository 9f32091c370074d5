//! Policy file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Why a reload was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// SIGHUP or an explicit request.
    Signal,
    /// A watched policy file changed on disk.
    FileChanged(PathBuf),
}

/// Watches policy files and forwards change events as reload triggers.
pub struct PolicyWatcher {
    paths: Vec<PathBuf>,
    poll_interval: Duration,
    trigger_tx: mpsc::UnboundedSender<ReloadTrigger>,
}

impl PolicyWatcher {
    /// Create a new PolicyWatcher feeding `trigger_tx`.
    pub fn new<P: AsRef<Path>>(
        paths: &[P],
        poll_interval: Duration,
        trigger_tx: mpsc::UnboundedSender<ReloadTrigger>,
    ) -> Self {
        Self {
            paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            poll_interval,
            trigger_tx,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        if let Some(path) = event.paths.first() {
                            tracing::info!(path = %path.display(), "Policy file change detected");
                            let _ = tx.send(ReloadTrigger::FileChanged(path.clone()));
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        for path in &self.paths {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(files = self.paths.len(), "Policy watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_fails_to_watch() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = PolicyWatcher::new(
            &[Path::new("/nonexistent/users")],
            Duration::from_secs(1),
            tx,
        );
        assert!(watcher.run().is_err());
    }
}
