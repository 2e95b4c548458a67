//! Lifecycle events.

use std::fmt;

use gristmill_core::EvalSeq;

/// One step of an evaluation plan.
///
/// Computations are referred to by their position in the [`EvalSeq`] the
/// events were formed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Storage for the computation must exist from here on.
    Declare { comp: usize },
    /// Start of the evaluation body. Emitted once, after every declaration.
    BeginBody,
    /// The computation is about to receive its first term.
    BeforeCompute { comp: usize },
    /// Accumulate one term into its computation.
    ComputeTerm { comp: usize, term: usize },
    /// No later event reads the computation.
    OutOfUse { comp: usize },
    /// End of the evaluation body.
    EndBody,
}

impl Event {
    /// Computation the event refers to, if any.
    pub fn comp(&self) -> Option<usize> {
        match *self {
            Event::Declare { comp }
            | Event::BeforeCompute { comp }
            | Event::ComputeTerm { comp, .. }
            | Event::OutOfUse { comp } => Some(comp),
            Event::BeginBody | Event::EndBody => None,
        }
    }

    /// Render the event with computation names taken from `seq`.
    ///
    /// Positions `seq` does not have are printed as `#n`.
    pub fn display<'a>(&'a self, seq: &'a EvalSeq) -> Display<'a> {
        Display { event: self, seq }
    }
}

/// See [`Event::display`].
pub struct Display<'a> {
    event: &'a Event,
    seq: &'a EvalSeq,
}

impl Display<'_> {
    fn name(&self, f: &mut fmt::Formatter<'_>, comp: usize) -> fmt::Result {
        match self.seq.get(comp) {
            Some(c) => write!(f, "{}", c.base),
            None => write!(f, "#{comp}"),
        }
    }
}

impl fmt::Display for Display<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, comp) = match *self.event {
            Event::BeginBody => return f.write_str("BeginBody"),
            Event::EndBody => return f.write_str("EndBody"),
            Event::Declare { comp } => ("Declare", comp),
            Event::BeforeCompute { comp } => ("BeforeCompute", comp),
            Event::OutOfUse { comp } => ("OutOfUse", comp),
            Event::ComputeTerm { comp, term } => {
                f.write_str("ComputeTerm(")?;
                self.name(f, comp)?;
                return write!(f, ", {term})");
            }
        };
        write!(f, "{label}(")?;
        self.name(f, comp)?;
        f.write_str(")")
    }
}
