//! Error types.
//!
//! Malformed input (move notation, protocol lines) is recoverable and
//! reported to the caller. A broken scoring invariant is a code defect and
//! is never returned past the board: it is logged and the process panics.

use thiserror::Error;

/// Malformed move or cell notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid move {text:?}: {reason}")]
pub struct MoveFormatError {
    /// The offending text.
    pub text: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl MoveFormatError {
    pub(crate) fn new(text: &str, reason: &'static str) -> Self {
        Self {
            text: text.to_string(),
            reason,
        }
    }
}

/// Malformed protocol line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {text:?}: {reason}")]
pub struct ProtocolParseError {
    /// The offending line.
    pub text: String,
    /// What was wrong with it.
    pub reason: String,
}

impl ProtocolParseError {
    pub(crate) fn new(text: &str, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// Incrementally maintained score disagrees with a full rescan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("score invariant broken at ({x}, {y}): expected {expected}, got {actual}")]
pub struct InvariantViolation {
    pub x: usize,
    pub y: usize,
    pub expected: i32,
    pub actual: i32,
}
