//! Users file subsystem.
//!
//! # Data Flow
//! ```text
//! users file (text)
//!     → parser.rs (lines → RawEntry, global order counter, $INCLUDE)
//!     → classify.rs (validate items, extract control flags, order replies)
//!     → Entry (immutable)
//!     → index builder
//! ```
//!
//! # Design Decisions
//! - Entries keep their file/line provenance for every build error
//! - `order` is global across a file and its includes, never per key
//! - Regular expressions are compiled once, at parse time

pub mod classify;
pub mod entry;
pub mod parser;

pub use classify::Classifier;
pub use entry::{AttrRef, Entry, Item, Operand, Operator, Pattern, RawEntry, Source, DEFAULT_NAME};
pub use parser::Parser;
