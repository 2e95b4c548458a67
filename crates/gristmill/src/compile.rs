//! The whole pipeline: optimize, schedule, hand over to a printer.

use gristmill_core::{Computation, EvalSeq};
use gristmill_generate::{form_events, replay, ContextBuilder, Event, Printer, ScheduleOptions};
use gristmill_optimize::{optimize, verify_eval_seq, OptimizeOptions, OptimizeReport};
use tracing::{info, instrument};

use crate::error::Result;

/// Options for [`compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub optimize: OptimizeOptions,
    pub schedule: ScheduleOptions,
    /// Check the optimized sequence against the input by inlining every
    /// intermediate. Inlining undoes all factorization, so this is meant
    /// for tests and debugging.
    pub verify: bool,
}

impl CompileOptions {
    pub fn with_optimize(mut self, optimize: OptimizeOptions) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleOptions) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// Output of [`compile`].
#[derive(Debug, Clone)]
pub struct Compiled {
    pub seq: EvalSeq,
    pub events: Vec<Event>,
    pub report: OptimizeReport,
}

impl Compiled {
    /// Replay the events into `printer`.
    pub fn print<P: Printer + ?Sized>(
        &self,
        builder: &ContextBuilder,
        printer: &mut P,
    ) -> Result<()> {
        replay(&self.seq, &self.events, builder, printer)?;
        Ok(())
    }
}

/// Optimize `equations` and form the event stream of the result.
#[instrument(skip_all, fields(equations = equations.len()))]
pub fn compile(equations: &[Computation], options: &CompileOptions) -> Result<Compiled> {
    let optimized = optimize(equations, &options.optimize)?;
    if options.verify {
        verify_eval_seq(equations, &optimized.seq)?;
    }
    let events = form_events(&optimized.seq, &options.schedule)?;
    info!(
        computations = optimized.seq.len(),
        events = events.len(),
        "compiled"
    );
    Ok(Compiled {
        seq: optimized.seq,
        events,
        report: optimized.report,
    })
}
