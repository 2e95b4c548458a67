//! Structural checks run before any search.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{IrError, Result};
use crate::range::{Index, Range};
use crate::symbol::Symbol;
use crate::term::Computation;

/// Declared ranks of external input tensors.
///
/// Computations always take their rank from their free indices. An input
/// tensor that is not declared here takes the rank of its first use.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    ranks: HashMap<Symbol, usize>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rank(mut self, base: impl Into<Symbol>, rank: usize) -> Self {
        self.ranks.insert(base.into(), rank);
        self
    }

    pub fn rank(&self, base: &Symbol) -> Option<usize> {
        self.ranks.get(base).copied()
    }
}

/// Validate a set of equations with no declared inputs.
pub fn validate(comps: &[Computation]) -> Result<()> {
    validate_with(comps, &Declarations::default())
}

/// Validate a set of equations against declared input ranks.
///
/// Checks, in order per computation: duplicate definitions, duplicate free
/// indices, then per term the summation list and every factor access.
pub fn validate_with(comps: &[Computation], decls: &Declarations) -> Result<()> {
    let mut ranks: HashMap<Symbol, usize> = HashMap::with_capacity(comps.len());
    for comp in comps {
        if ranks.insert(comp.base.clone(), comp.rank()).is_some() {
            return Err(IrError::DuplicateTarget {
                target: comp.base.clone(),
            });
        }
    }

    for comp in comps {
        check_free_indices(comp)?;
        for t in 0..comp.terms.len() {
            check_term(comp, t, decls, &mut ranks)?;
        }
    }
    debug!(computations = comps.len(), "equations validated");
    Ok(())
}

fn check_free_indices(comp: &Computation) -> Result<()> {
    let mut seen = HashSet::with_capacity(comp.indices.len());
    for idx in &comp.indices {
        if !seen.insert(&idx.symbol) {
            return Err(IrError::DuplicateFreeIndex {
                target: comp.base.clone(),
                index: idx.symbol.clone(),
            });
        }
    }
    Ok(())
}

fn check_term(
    comp: &Computation,
    t: usize,
    decls: &Declarations,
    ranks: &mut HashMap<Symbol, usize>,
) -> Result<()> {
    let term = &comp.terms[t];
    let mut bound: HashMap<&Symbol, &Range> = comp
        .indices
        .iter()
        .map(|idx| (&idx.symbol, &idx.range))
        .collect();

    let mut sums_seen = HashSet::with_capacity(term.sums.len());
    for idx in &term.sums {
        if !sums_seen.insert(&idx.symbol) {
            return Err(IrError::DuplicateSummation {
                target: comp.base.clone(),
                term: t,
                index: idx.symbol.clone(),
            });
        }
        if comp.indices.iter().any(|f| f.symbol == idx.symbol) {
            return Err(IrError::SummationShadowsFree {
                target: comp.base.clone(),
                term: t,
                index: idx.symbol.clone(),
            });
        }
        bound.insert(&idx.symbol, &idx.range);
    }

    for factor in &term.factors {
        if factor.exponent == 0 {
            return Err(IrError::ZeroExponent {
                target: comp.base.clone(),
                term: t,
                base: factor.base.clone(),
            });
        }
        for idx in &factor.indices {
            check_access(comp, t, &bound, idx)?;
        }

        let expected = match ranks.get(&factor.base) {
            Some(&rank) => rank,
            None => {
                let rank = decls.rank(&factor.base).unwrap_or(factor.rank());
                ranks.insert(factor.base.clone(), rank);
                rank
            }
        };
        if expected != factor.rank() {
            return Err(IrError::RankMismatch {
                target: comp.base.clone(),
                term: t,
                base: factor.base.clone(),
                expected,
                found: factor.rank(),
            });
        }
    }
    Ok(())
}

fn check_access(
    comp: &Computation,
    t: usize,
    bound: &HashMap<&Symbol, &Range>,
    idx: &Index,
) -> Result<()> {
    match bound.get(&idx.symbol) {
        None => Err(IrError::UnboundIndex {
            target: comp.base.clone(),
            term: t,
            index: idx.symbol.clone(),
        }),
        Some(range) if **range != idx.range => Err(IrError::RangeConflict {
            target: comp.base.clone(),
            term: t,
            index: idx.symbol.clone(),
            expected: range.name().clone(),
            found: idx.range.name().clone(),
        }),
        Some(_) => Ok(()),
    }
}
