//! AAA policy daemon.
//!
//! Loads users-file policy, keeps it published for lookups, and reloads it
//! on SIGHUP or when a policy file changes.
//!
//! # Architecture Overview
//!
//! ```text
//!   users files ──▶ users::Parser ──▶ users::Classifier ──▶ index::IndexBuilder
//!                                                                  │
//!                                                                  ▼
//!                                             module::PolicySet (immutable)
//!                                                                  │ ArcSwap
//!   Request ──▶ index::KeyExtractor ──▶ engine::Matcher ◀──────────┘
//!                                          │
//!                                          ├─▶ engine::ConditionEvaluator (check items)
//!                                          └─▶ request::EditList (reply items, commit/abort)
//!
//!   SIGHUP / file watcher ──▶ lifecycle::reload ──▶ FilesModule::reload ──▶ ArcSwap::store
//!   Ctrl-C ──▶ lifecycle::Shutdown
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use aaa_policy::config::{load_config, PolicyWatcher};
use aaa_policy::lifecycle::{reload::run_reloader, signals, startup, Shutdown};

#[derive(Parser)]
#[command(name = "aaa-policy")]
#[command(about = "Users-file AAA policy daemon", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "policy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let module = startup::start(&config)?;

    tracing::info!(config = %args.config.display(), "aaa-policy v0.1.0 starting");

    let shutdown = Shutdown::new();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();

    let _watcher = if config.reload.watch {
        let mut files: Vec<PathBuf> = config.module.files().iter().map(|p| p.to_path_buf()).collect();
        files.extend(module.policies().sources());
        files.sort();
        files.dedup();

        let watcher = PolicyWatcher::new(
            &files,
            Duration::from_secs(config.reload.poll_interval_secs),
            reload_tx.clone(),
        );
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "File watcher unavailable, reload on SIGHUP only");
                None
            }
        }
    } else {
        None
    };

    let reloader = tokio::spawn(run_reloader(module.clone(), reload_rx, shutdown.subscribe()));

    signals::handle_signals(&shutdown, reload_tx).await?;
    let _ = reloader.await;

    tracing::info!(generation = module.generation(), "Shutdown complete");
    Ok(())
}
