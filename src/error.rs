//! Error types for building and consulting policy tables.

use std::path::PathBuf;

use thiserror::Error;

use crate::dictionary::{DictionaryError, ValueError, ValueType};
use crate::engine::EvalError;
use crate::request::ApplyError;
use crate::users::{Operator, Source};

/// Build-time errors. Any of these rejects the whole reload.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{at} {message}")]
    Parse { at: Source, message: String },

    #[error("{at} Left side of check item {item} is not an attribute")]
    InvalidCheckLhs { at: Source, item: String },

    #[error("{at} Left side of reply item {item} is not an attribute")]
    InvalidReplyLhs { at: Source, item: String },

    #[error("{at} Invalid operator reply item {attr} {op} ...")]
    IllegalOperator { at: Source, attr: String, op: Operator },

    #[error("{at} Invalid right-hand side of assignment for attribute {attr}")]
    RegexOrExecNotAllowed { at: Source, attr: String },

    #[error("{at} Value for {attr} must be static boolean")]
    InvalidControlValue { at: Source, attr: String },

    #[error("{at} Cannot use {attr} when key is not an IP / IP prefix")]
    ShortestPrefixWithoutTrie { at: Source, attr: String },

    #[error("No key attribute configured")]
    NoKey,

    #[error("Invalid data type '{ty}' for key attribute {attr}")]
    KeyType { attr: String, ty: ValueType },

    #[error("Key attributes must share one type: {first} is {first_ty}, {other} is {other_ty}")]
    KeyTypeMismatch {
        first: String,
        first_ty: ValueType,
        other: String,
        other_ty: ValueType,
    },

    #[error("{at} Failed parsing key {key} - {reason}")]
    KeyParse {
        at: Source,
        key: String,
        #[source]
        reason: ValueError,
    },

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error("Failed reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PolicyError {
    /// Errors raised by the entry classifier.
    pub fn is_classify(&self) -> bool {
        matches!(
            self,
            PolicyError::InvalidCheckLhs { .. }
                | PolicyError::InvalidReplyLhs { .. }
                | PolicyError::IllegalOperator { .. }
                | PolicyError::RegexOrExecNotAllowed { .. }
                | PolicyError::InvalidControlValue { .. }
                | PolicyError::ShortestPrefixWithoutTrie { .. }
        )
    }
}

/// Request-time errors. These fail one lookup and never touch the index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{at} Failed evaluating check item {item}: {reason}")]
    Condition {
        at: Source,
        item: String,
        #[source]
        reason: EvalError,
    },

    #[error("{at} Assignment operator in check item {item}")]
    AssignmentInCheck { at: Source, item: String },

    #[error("{at} Failed applying reply items: {reason}")]
    Apply {
        at: Source,
        #[source]
        reason: ApplyError,
    },
}
