//! Lookup engine.
//!
//! # Data Flow
//! ```text
//! Request
//!     → KeyExtractor::extract → Option<LookupKey>
//!     → Index::find (exact / longest prefix) → keyed bucket
//!     → MergeWalk(keyed, DEFAULT) by ascending order
//!         → ConditionEvaluator per check item (all must pass)
//!         → EditList::apply reply items
//!         → stop | fall through | widen to a shorter prefix
//!     → commit (Matched) | abort (NoMatch / error)
//! ```
//!
//! # Design Decisions
//! - One edit transaction per lookup, not per entry
//! - Evaluation and apply errors fail the lookup, never the table
//! - The walk holds only shared references into an immutable table

pub mod evaluator;
pub mod matcher;

pub use evaluator::{ConditionEvaluator, EvalError, LegacyEvaluator};
pub use matcher::{Matcher, Outcome};
