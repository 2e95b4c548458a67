//! gristmill: a compiler for tensor contraction equations.
//!
//! Equations go in as [`Computation`]s. [`compile`] factorizes them into an
//! [`EvalSeq`] with shared intermediates, then orders that sequence into a
//! stream of lifecycle [`Event`]s. A [`Printer`] turns the events into code
//! for one output notation.
//!
//! ```
//! use gristmill::{compile, indices, CompileOptions, Computation, Factor, Range, Term};
//!
//! let r = Range::zero_to("R", "n");
//! let chain = |target: &str, last: &str| {
//!     Computation::new(target, indices(&r, &["a", "b"])).with_term(
//!         Term::product(vec![
//!             Factor::new("x", indices(&r, &["a", "c"])),
//!             Factor::new("y", indices(&r, &["c", "d"])),
//!             Factor::new(last, indices(&r, &["d", "b"])),
//!         ])
//!         .summed(indices(&r, &["c", "d"])),
//!     )
//! };
//!
//! let input = [chain("r1", "z"), chain("r2", "w")];
//! let compiled = compile(&input, &CompileOptions::default()).unwrap();
//! assert_eq!(compiled.report.intermediates, 1);
//! assert!(compiled.report.optimized_cost < compiled.report.naive_cost);
//! ```

pub mod compile;
pub mod error;

pub use compile::{compile, CompileOptions, Compiled};
pub use error::{Error, Result};

// Expression model
pub use gristmill_core::{
    indices, validate, BitSet, Computation, EvalSeq, Expr, Factor, Index, IrError, Phase, Range,
    Symbol, Term, DEFAULT_SIZE_ESTIMATE,
};

// Optimizer
pub use gristmill_optimize::{
    flop_cost, inline_intermediates, optimize, verify_eval_seq, OptimizeError, OptimizeOptions,
    OptimizeReport, Optimized, Strategy, VerifyError,
};

// Scheduling and printing
pub use gristmill_generate::{
    form_events, generate, replay, ComputationContext, ContextBuilder, ContextError, Event,
    EventLog, FactorContext, GenerateError, IndexContext, Printer, ScheduleError, ScheduleOptions,
    TermContext,
};
