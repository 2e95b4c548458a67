//! Code-generation front end for gristmill evaluation sequences.
//!
//! - [`form_events`] orders an [`EvalSeq`] into a stream of lifecycle
//!   [`Event`]s: declarations, the body, per-term computation and the point
//!   where each intermediate falls out of use.
//! - [`ContextBuilder`] flattens a computation into the strings a printer
//!   needs.
//! - [`Printer`] is implemented once per output notation; [`replay`] drives
//!   it through an event stream.
//!
//! [`EvalSeq`]: gristmill_core::EvalSeq

pub mod context;
pub mod error;
pub mod event;
pub mod printer;
pub mod schedule;

// Events and scheduling
pub use event::Event;
pub use schedule::{form_events, ScheduleOptions};

// Contexts
pub use context::{
    ComputationContext, ContextBuilder, FactorContext, IndexContext, MangleFn, PowerFn, TermContext,
};

// Printers
pub use printer::{generate, replay, EventLog, Printer};

pub use error::{ContextError, GenerateError, Result, ScheduleError};
