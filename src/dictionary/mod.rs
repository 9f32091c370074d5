//! Attribute dictionary subsystem.
//!
//! # Data Flow
//! ```text
//! builtin attribute set + [[dictionary.attributes]] from config
//!     → attr.rs (Dictionary: name → AttrDef)
//!     → value.rs (AttrDef::parse_value → typed Value)
//!
//! At startup:
//!     Dictionary → ControlAttrs (Fall-Through, Next-Shortest-Prefix)
//!     → handed to the classifier, never looked up per entry
//! ```
//!
//! # Design Decisions
//! - Names are case-insensitive, identity is the attribute number
//! - Values are a closed tagged union, chosen per attribute at definition time
//! - IP prefixes are normalized (host bits cleared) when parsed

pub mod attr;
pub mod value;

pub use attr::{AttrDef, ControlAttrs, Dictionary, DictionaryError, FALL_THROUGH, NEXT_SHORTEST_PREFIX};
pub use value::{Value, ValueError, ValueType};
