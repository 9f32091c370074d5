//! Policy module subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ModuleConfig + Dictionary
//!     → ControlAttrs::resolve, KeyExtractor::from_names (fail fast)
//!     → parse + index every configured file → PolicySet (generation 1)
//!     → ArcSwap::from_pointee
//!
//! Per request (any number concurrently):
//!     Phase → PolicySet::table (phase file, else common file)
//!     → KeyExtractor::extract → Matcher::run → Outcome | LookupError
//!
//! Reload (SIGHUP / file change):
//!     build a complete new PolicySet → ArcSwap::store
//!     in-flight lookups finish on the set they loaded
//! ```
//!
//! # Design Decisions
//! - All files of one reload are published together or not at all
//! - A failed reload leaves the published set untouched
//! - Tables are immutable after build; lookups take no locks

pub mod files;
pub mod phase;
pub mod policy_set;

pub use files::FilesModule;
pub use phase::Phase;
pub use policy_set::PolicySet;
