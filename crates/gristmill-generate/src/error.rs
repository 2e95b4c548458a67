//! Error types for scheduling, context building and printer replay.

use gristmill_core::Symbol;
use thiserror::Error;

/// The evaluation sequence cannot be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Computations that depend on each other, in sequence order.
    #[error("dependency cycle between {participants:?}")]
    Cycle { participants: Vec<Symbol> },
}

/// A printer asked for something its context does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("'{target}' has {len} terms, term {term} requested")]
    TermOutOfRange {
        target: Symbol,
        term: usize,
        len: usize,
    },
}

/// Failure while replaying events into a printer.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Context(#[from] ContextError),

    /// An event names a computation the sequence does not have.
    #[error("event refers to computation {comp}, sequence has {len}")]
    UnknownComputation { comp: usize, len: usize },

    /// The printer itself failed.
    #[error("printer failed at {event}")]
    Printer {
        event: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, GenerateError>;
