//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, resolve relative paths)
//!     → validation.rs (semantic checks)
//!     → PolicyConfig (validated, immutable)
//!     → FilesModule::from_config
//!
//! On reload trigger:
//!     watcher.rs detects a policy file change (or SIGHUP arrives)
//!     → FilesModule::reload re-parses every policy file
//!     → atomic swap of the published PolicySet
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only policy files are reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AttributeConfig, DictionaryConfig, ModuleConfig, ObservabilityConfig, PolicyConfig, ReloadConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::{PolicyWatcher, ReloadTrigger};
