//! AAA policy engine backed by users files.
//!
//! Parses users files into immutable indexed tables, matches requests
//! against them (keyed entries merged with `DEFAULT` entries in file order),
//! applies reply edits transactionally, and reloads atomically.

pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod module;
pub mod observability;
pub mod request;
pub mod users;

pub use config::schema::PolicyConfig;
pub use engine::Outcome;
pub use error::{LookupError, PolicyError};
pub use lifecycle::Shutdown;
pub use module::{FilesModule, Phase};
