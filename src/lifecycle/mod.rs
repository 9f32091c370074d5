//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging/metrics → Build policy module
//!
//! Reload (signals.rs, config/watcher.rs → reload.rs):
//!     SIGHUP / file change → ReloadTrigger → FilesModule::reload
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C → broadcast → reload worker exits → process exits
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then policy
//! - Reload triggers are coalesced; rebuilds run on the blocking pool

pub mod reload;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
