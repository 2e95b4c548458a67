//! Error types for optimization and verification.

use gristmill_core::{IrError, Symbol};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("invalid input: {0}")]
    Ir(#[from] IrError),

    #[error("flat_threshold must be finite and positive, got {0}")]
    InvalidThreshold(f64),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Reasons an evaluation sequence fails to reproduce its source equations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Ir(#[from] IrError),

    #[error("'{target}' is missing from the evaluation sequence")]
    MissingTarget { target: Symbol },

    #[error("'{target}' has free indices {found:?}, expected {expected:?}")]
    IndexMismatch {
        target: Symbol,
        expected: Vec<Symbol>,
        found: Vec<Symbol>,
    },

    #[error("'{target}' expands to {found} terms, expected {expected}; unmatched: {unmatched}")]
    TermMismatch {
        target: Symbol,
        expected: usize,
        found: usize,
        unmatched: String,
    },

    #[error("in '{target}': cannot inline '{base}' raised to power {exponent}")]
    UnsupportedPower {
        target: Symbol,
        base: Symbol,
        exponent: u32,
    },

    #[error("'{target}' is defined in terms of itself")]
    Cycle { target: Symbol },
}
