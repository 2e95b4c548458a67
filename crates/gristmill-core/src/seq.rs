//! Evaluation sequences.

use std::collections::HashMap;
use std::ops;

use crate::error::{IrError, Result};
use crate::symbol::Symbol;
use crate::term::Computation;

/// An ordered list of computations with at most one definition per base.
///
/// Computation `A` depends on computation `B` iff a term of `A` has a
/// factor whose base is `B`'s base. A well-formed sequence lists every
/// computation after all of its dependencies; construction does not
/// enforce this (see [`EvalSeq::first_forward_reference`]), the scheduler
/// copes with forward references and rejects real cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalSeq {
    comps: Vec<Computation>,
    positions: HashMap<Symbol, usize>,
}

impl EvalSeq {
    /// Build a sequence, rejecting duplicated targets.
    pub fn new(comps: Vec<Computation>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(comps.len());
        for (i, comp) in comps.iter().enumerate() {
            if positions.insert(comp.base.clone(), i).is_some() {
                return Err(IrError::DuplicateTarget {
                    target: comp.base.clone(),
                });
            }
        }
        Ok(Self { comps, positions })
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Computation> {
        self.comps.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Computation> {
        self.comps.get(i)
    }

    pub fn as_slice(&self) -> &[Computation] {
        &self.comps
    }

    pub fn into_inner(self) -> Vec<Computation> {
        self.comps
    }

    /// Position of the computation defining `base`.
    pub fn position(&self, base: &Symbol) -> Option<usize> {
        self.positions.get(base).copied()
    }

    /// Computations referenced by term `term` of computation `comp`,
    /// ascending and without repetition.
    pub fn term_dependencies(&self, comp: usize, term: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self.comps[comp].terms[term]
            .factors
            .iter()
            .filter_map(|f| self.position(&f.base))
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Computations referenced anywhere in computation `comp`, ascending and
    /// without repetition.
    pub fn dependencies(&self, comp: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = (0..self.comps[comp].terms.len())
            .flat_map(|t| self.term_dependencies(comp, t))
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// First `(consumer, dependency)` pair where the dependency is not
    /// listed strictly before its consumer, if any.
    pub fn first_forward_reference(&self) -> Option<(usize, usize)> {
        (0..self.comps.len()).find_map(|i| {
            self.dependencies(i)
                .into_iter()
                .find(|&d| d >= i)
                .map(|d| (i, d))
        })
    }

    pub fn intermediate_count(&self) -> usize {
        self.comps.iter().filter(|c| c.is_intermediate).count()
    }
}

impl ops::Index<usize> for EvalSeq {
    type Output = Computation;

    fn index(&self, i: usize) -> &Computation {
        &self.comps[i]
    }
}

impl<'a> IntoIterator for &'a EvalSeq {
    type Item = &'a Computation;
    type IntoIter = std::slice::Iter<'a, Computation>;

    fn into_iter(self) -> Self::IntoIter {
        self.comps.iter()
    }
}
