//! Error types for malformed equation input.

use thiserror::Error;

use crate::symbol::Symbol;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("duplicate definition of '{target}'")]
    DuplicateTarget { target: Symbol },

    #[error("in '{target}', term {term}: index '{index}' is neither free nor summed")]
    UnboundIndex {
        target: Symbol,
        term: usize,
        index: Symbol,
    },

    #[error("in '{target}': free index '{index}' appears more than once")]
    DuplicateFreeIndex { target: Symbol, index: Symbol },

    #[error("in '{target}', term {term}: summation index '{index}' appears more than once")]
    DuplicateSummation {
        target: Symbol,
        term: usize,
        index: Symbol,
    },

    #[error("in '{target}', term {term}: summation index '{index}' shadows a free index")]
    SummationShadowsFree {
        target: Symbol,
        term: usize,
        index: Symbol,
    },

    #[error(
        "in '{target}', term {term}: index '{index}' has range '{expected}', used as '{found}'"
    )]
    RangeConflict {
        target: Symbol,
        term: usize,
        index: Symbol,
        expected: Symbol,
        found: Symbol,
    },

    #[error(
        "in '{target}', term {term}: '{base}' has rank {expected} but is used with {found} indices"
    )]
    RankMismatch {
        target: Symbol,
        term: usize,
        base: Symbol,
        expected: usize,
        found: usize,
    },

    #[error("in '{target}', term {term}: factor '{base}' has exponent 0")]
    ZeroExponent {
        target: Symbol,
        term: usize,
        base: Symbol,
    },
}

impl IrError {
    /// The computation the error is about.
    pub fn target(&self) -> &Symbol {
        match self {
            IrError::DuplicateTarget { target }
            | IrError::UnboundIndex { target, .. }
            | IrError::DuplicateFreeIndex { target, .. }
            | IrError::DuplicateSummation { target, .. }
            | IrError::SummationShadowsFree { target, .. }
            | IrError::RangeConflict { target, .. }
            | IrError::RankMismatch { target, .. }
            | IrError::ZeroExponent { target, .. } => target,
        }
    }
}

pub type Result<T> = std::result::Result<T, IrError>;
