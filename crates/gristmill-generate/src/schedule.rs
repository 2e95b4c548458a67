//! Lifecycle scheduling.
//!
//! [`form_events`] orders the computations of an [`EvalSeq`] and marks the
//! window during which every intermediate has to stay materialized.
//!
//! A top-level pass walks the sequence in order. Whenever a computation
//! completes, the consumer terms it unblocks are computed right away
//! ("driving"), so that an intermediate is consumed and released while it
//! is still close by. The traversal uses an explicit frame stack.

use gristmill_core::EvalSeq;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, instrument, trace};

use crate::error::ScheduleError;
use crate::event::Event;

/// Options for [`form_events`].
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    /// Declare result computations along with the intermediates.
    ///
    /// Results are caller-owned storage, so by default only intermediates
    /// are declared.
    pub declare_results: bool,
}

impl ScheduleOptions {
    pub fn with_declare_results(mut self, declare_results: bool) -> Self {
        self.declare_results = declare_results;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Undeclared,
    Declared,
    InProgress,
    Done,
    Freed,
}

#[derive(Debug)]
enum Frame {
    /// Compute `comp` to completion, starting whatever blocks it first.
    Advance(usize),
    /// Continue `comp` for as long as its next term is ready.
    Resume(usize),
    /// Visit the consumers of a just-completed computation.
    Drive { comp: usize, next: usize },
}

struct Scheduler<'s> {
    seq: &'s EvalSeq,
    /// `[comp][term]`: computations the term reads.
    deps: Vec<Vec<Vec<usize>>>,
    /// `[comp]`: `(consumer, term)` pairs reading it, in sequence order.
    consumers: Vec<Vec<(usize, usize)>>,
    /// `[comp][term]`: dependencies of the term not yet complete.
    pending: Vec<Vec<usize>>,
    /// `[comp]`: consumer terms not yet computed.
    remaining: Vec<usize>,
    next_term: Vec<usize>,
    state: Vec<State>,
    events: Vec<Event>,
    live: usize,
    peak_live: usize,
}

/// Form the lifecycle event stream of `seq`.
///
/// Fails without emitting anything when the computations depend on each
/// other cyclically. References to names outside the sequence are inputs
/// and impose no order.
#[instrument(skip_all, fields(computations = seq.len()))]
pub fn form_events(
    seq: &EvalSeq,
    options: &ScheduleOptions,
) -> Result<Vec<Event>, ScheduleError> {
    check_acyclic(seq)?;

    let mut scheduler = Scheduler::new(seq);
    scheduler.declare(options);
    scheduler.emit(Event::BeginBody);
    for comp in 0..seq.len() {
        if !scheduler.is_complete(comp) {
            scheduler.run(Frame::Advance(comp));
        }
    }
    scheduler.emit(Event::EndBody);

    debug!(
        events = scheduler.events.len(),
        peak_live = scheduler.peak_live,
        "events formed"
    );
    Ok(scheduler.events)
}

/// Reject sequences whose dependency graph has a cycle, naming every
/// computation on one.
fn check_acyclic(seq: &EvalSeq) -> Result<(), ScheduleError> {
    let mut graph = DiGraph::<usize, ()>::new();
    let nodes: Vec<NodeIndex> = (0..seq.len()).map(|c| graph.add_node(c)).collect();
    for (c, &node) in nodes.iter().enumerate() {
        for d in seq.dependencies(c) {
            graph.add_edge(nodes[d], node, ());
        }
    }

    let mut participants: Vec<usize> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(|n| graph[n])
        .collect();
    if participants.is_empty() {
        return Ok(());
    }
    participants.sort_unstable();
    Err(ScheduleError::Cycle {
        participants: participants.into_iter().map(|c| seq[c].base.clone()).collect(),
    })
}

impl<'s> Scheduler<'s> {
    fn new(seq: &'s EvalSeq) -> Self {
        let n = seq.len();
        let deps: Vec<Vec<Vec<usize>>> = (0..n)
            .map(|c| (0..seq[c].terms.len()).map(|t| seq.term_dependencies(c, t)).collect())
            .collect();

        let mut consumers = vec![Vec::new(); n];
        for (c, terms) in deps.iter().enumerate() {
            for (t, term_deps) in terms.iter().enumerate() {
                for &d in term_deps {
                    consumers[d].push((c, t));
                }
            }
        }
        let pending = deps.iter().map(|terms| terms.iter().map(Vec::len).collect()).collect();
        let remaining = consumers.iter().map(Vec::len).collect();

        Self {
            seq,
            deps,
            consumers,
            pending,
            remaining,
            next_term: vec![0; n],
            state: vec![State::Undeclared; n],
            events: Vec::new(),
            live: 0,
            peak_live: 0,
        }
    }

    fn emit(&mut self, event: Event) {
        trace!(event = %event.display(self.seq), "event");
        self.events.push(event);
    }

    fn declare(&mut self, options: &ScheduleOptions) {
        for (c, comp) in self.seq.iter().enumerate() {
            if comp.is_intermediate || options.declare_results {
                self.state[c] = State::Declared;
                self.emit(Event::Declare { comp: c });
            }
        }
    }

    fn is_complete(&self, comp: usize) -> bool {
        matches!(self.state[comp], State::Done | State::Freed)
    }

    /// First incomplete dependency of the next term of `comp`.
    fn blocker(&self, comp: usize) -> Option<usize> {
        let deps = self.deps[comp].get(self.next_term[comp])?;
        deps.iter().copied().find(|&d| !self.is_complete(d))
    }

    fn run(&mut self, start: Frame) {
        let mut stack = vec![start];
        while let Some(frame) = stack.last_mut() {
            match frame {
                Frame::Advance(comp) => {
                    let comp = *comp;
                    if self.is_complete(comp) {
                        stack.pop();
                    } else if let Some(dep) = self.blocker(comp) {
                        stack.push(Frame::Advance(dep));
                    } else {
                        self.step(comp, &mut stack);
                    }
                }
                Frame::Resume(comp) => {
                    let comp = *comp;
                    if self.is_complete(comp) || self.blocker(comp).is_some() {
                        stack.pop();
                    } else {
                        self.step(comp, &mut stack);
                    }
                }
                Frame::Drive { comp, next } => {
                    let (comp, i) = (*comp, *next);
                    *next += 1;
                    match self.consumers[comp].get(i).copied() {
                        None => {
                            stack.pop();
                        }
                        Some((consumer, term)) => {
                            if self.next_term[consumer] == term
                                && self.pending[consumer][term] == 0
                            {
                                stack.push(Frame::Resume(consumer));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Compute the next term of `comp`, whose dependencies are complete.
    fn step(&mut self, comp: usize, stack: &mut Vec<Frame>) {
        if self.state[comp] != State::InProgress {
            self.state[comp] = State::InProgress;
            if self.seq[comp].is_intermediate {
                self.live += 1;
                self.peak_live = self.peak_live.max(self.live);
            }
            self.emit(Event::BeforeCompute { comp });
        }

        let n_terms = self.seq[comp].terms.len();
        let term = self.next_term[comp];
        if term < n_terms {
            self.emit(Event::ComputeTerm { comp, term });
            self.next_term[comp] += 1;
            for i in 0..self.deps[comp][term].len() {
                let dep = self.deps[comp][term][i];
                self.release(dep);
            }
        }

        if self.next_term[comp] == n_terms {
            self.complete(comp);
            stack.push(Frame::Drive { comp, next: 0 });
        }
    }

    fn complete(&mut self, comp: usize) {
        self.state[comp] = State::Done;
        for i in 0..self.consumers[comp].len() {
            let (consumer, term) = self.consumers[comp][i];
            self.pending[consumer][term] -= 1;
        }
        if self.remaining[comp] == 0 && self.seq[comp].is_intermediate {
            self.free(comp);
        }
    }

    /// One consumer term of `comp` has been computed.
    fn release(&mut self, comp: usize) {
        self.remaining[comp] -= 1;
        if self.remaining[comp] == 0 && self.seq[comp].is_intermediate {
            self.free(comp);
        }
    }

    fn free(&mut self, comp: usize) {
        self.state[comp] = State::Freed;
        self.live -= 1;
        self.emit(Event::OutOfUse { comp });
    }
}
