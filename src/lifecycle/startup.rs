//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from configuration
//! - Build the policy module (dictionary, key, every policy file)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Logging first, so module build errors are reported through it

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{ConfigError, PolicyConfig};
use crate::module::FilesModule;
use crate::observability::{logging, metrics};

/// Bring up observability and load the policy module.
/// Metrics need a Tokio runtime when enabled.
pub fn start(config: &PolicyConfig) -> Result<Arc<FilesModule>, ConfigError> {
    logging::init_logging(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let module = FilesModule::from_config(config)?;
    let policies = module.policies();
    tracing::info!(
        files = policies.tables().count(),
        entries = policies.entries(),
        generation = policies.generation(),
        "Policy module ready"
    );
    Ok(Arc::new(module))
}
