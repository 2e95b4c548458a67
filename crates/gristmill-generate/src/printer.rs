//! The printer contract and event replay.

use gristmill_core::EvalSeq;
use tracing::{debug, instrument};

use crate::context::{ComputationContext, ContextBuilder, TermContext};
use crate::error::{GenerateError, Result};
use crate::event::Event;
use crate::schedule::{form_events, ScheduleOptions};

/// A code generator for one output notation.
///
/// Methods are called in event order by [`replay`]; each receives the
/// context of the computation the event refers to.
pub trait Printer {
    fn declare(&mut self, ctx: &ComputationContext) -> anyhow::Result<()>;

    fn begin_body(&mut self) -> anyhow::Result<()>;

    fn before_compute(&mut self, ctx: &ComputationContext) -> anyhow::Result<()>;

    fn compute_term(&mut self, ctx: &ComputationContext, term: &TermContext) -> anyhow::Result<()>;

    fn out_of_use(&mut self, ctx: &ComputationContext) -> anyhow::Result<()>;

    fn end_body(&mut self) -> anyhow::Result<()>;
}

/// Dispatch `events` formed from `seq` to `printer`.
///
/// Each computation's context is built once, on first use.
#[instrument(skip_all, fields(events = events.len()))]
pub fn replay<P: Printer + ?Sized>(
    seq: &EvalSeq,
    events: &[Event],
    builder: &ContextBuilder,
    printer: &mut P,
) -> Result<()> {
    let mut contexts: Vec<Option<ComputationContext>> = (0..seq.len()).map(|_| None).collect();

    for event in events {
        let printed = match *event {
            Event::BeginBody => printer.begin_body(),
            Event::EndBody => printer.end_body(),
            Event::Declare { comp } => printer.declare(context(&mut contexts, seq, builder, comp)?),
            Event::BeforeCompute { comp } => {
                printer.before_compute(context(&mut contexts, seq, builder, comp)?)
            }
            Event::ComputeTerm { comp, term } => {
                let ctx = context(&mut contexts, seq, builder, comp)?;
                printer.compute_term(ctx, ctx.term(term)?)
            }
            Event::OutOfUse { comp } => {
                printer.out_of_use(context(&mut contexts, seq, builder, comp)?)
            }
        };
        printed.map_err(|source| GenerateError::Printer {
            event: event.display(seq).to_string(),
            source,
        })?;
    }

    debug!(
        contexts = contexts.iter().filter(|c| c.is_some()).count(),
        "events replayed"
    );
    Ok(())
}

fn context<'c>(
    contexts: &'c mut [Option<ComputationContext>],
    seq: &EvalSeq,
    builder: &ContextBuilder,
    comp: usize,
) -> Result<&'c ComputationContext> {
    let len = contexts.len();
    let slot = contexts
        .get_mut(comp)
        .ok_or(GenerateError::UnknownComputation { comp, len })?;
    Ok(slot.get_or_insert_with(|| builder.build(&seq[comp])))
}

/// Schedule `seq` and print it in one go.
pub fn generate<P: Printer + ?Sized>(
    seq: &EvalSeq,
    options: &ScheduleOptions,
    builder: &ContextBuilder,
    printer: &mut P,
) -> Result<()> {
    let events = form_events(seq, options)?;
    replay(seq, &events, builder, printer)
}

// ============================================================================
// EventLog
// ============================================================================

/// A printer that records one line of text per event.
///
/// ```text
/// declare I1[a,b]
/// begin
/// before I1
/// I1[a,b] += 1/1 * sum(c) X[a,c] * Y[c,b]
/// free I1
/// end
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    lines: Vec<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

fn target(ctx: &ComputationContext) -> String {
    if ctx.indices.is_empty() {
        return ctx.base.clone();
    }
    let indices: Vec<&str> = ctx.indices.iter().map(|i| i.index.as_str()).collect();
    format!("{}[{}]", ctx.base, indices.join(","))
}

impl Printer for EventLog {
    fn declare(&mut self, ctx: &ComputationContext) -> anyhow::Result<()> {
        self.lines.push(format!("declare {}", target(ctx)));
        Ok(())
    }

    fn begin_body(&mut self) -> anyhow::Result<()> {
        self.lines.push("begin".to_string());
        Ok(())
    }

    fn before_compute(&mut self, ctx: &ComputationContext) -> anyhow::Result<()> {
        self.lines.push(format!("before {}", ctx.base));
        Ok(())
    }

    fn compute_term(&mut self, ctx: &ComputationContext, term: &TermContext) -> anyhow::Result<()> {
        let mut line = format!(
            "{} {}= {}/{} *",
            target(ctx),
            term.phase,
            term.numerator,
            term.denominator
        );
        if !term.sums.is_empty() {
            let sums: Vec<&str> = term.sums.iter().map(|s| s.index.as_str()).collect();
            line.push_str(&format!(" sum({})", sums.join(",")));
        }
        let factors = term.indexed_factors.iter().map(|f| {
            if f.indices.is_empty() {
                f.base.clone()
            } else {
                let indices: Vec<&str> = f.indices.iter().map(|i| i.index.as_str()).collect();
                format!("{}[{}]", f.base, indices.join(","))
            }
        });
        let factors: Vec<String> = factors.chain(term.other_factors.iter().cloned()).collect();
        if !factors.is_empty() {
            line.push(' ');
            line.push_str(&factors.join(" * "));
        }
        self.lines.push(line);
        Ok(())
    }

    fn out_of_use(&mut self, ctx: &ComputationContext) -> anyhow::Result<()> {
        self.lines.push(format!("free {}", ctx.base));
        Ok(())
    }

    fn end_body(&mut self) -> anyhow::Result<()> {
        self.lines.push("end".to_string());
        Ok(())
    }
}
