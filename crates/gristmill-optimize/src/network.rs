//! A term viewed as a contraction network.
//!
//! Leaves are the factors of the term, numbered by position. Every distinct
//! index of the term gets a bit in the index pool. A subset of leaves is a
//! candidate intermediate; its externals are the indices it shares with the
//! rest of the term or that must survive the whole product (pinned), and
//! everything else it touches can be summed inside it.

use std::collections::HashMap;

use gristmill_core::{BitSet, Computation, Factor, Index, Symbol, Term};

use crate::canon::{canonicalize, Canonical, Role};
use crate::cost::{term_cost, Cost};

#[derive(Debug)]
pub struct TermNetwork<'a> {
    /// Position of the owning computation in the input.
    pub comp: usize,
    /// Position of the term in its computation.
    pub term: usize,
    pub target: &'a Computation,
    pool: Vec<Index>,
    bits: HashMap<Symbol, usize>,
    leaf_indices: Vec<BitSet>,
    pinned: BitSet,
    all: BitSet,
}

impl<'a> TermNetwork<'a> {
    pub fn new(comp: usize, term: usize, target: &'a Computation) -> Self {
        let t = &target.terms[term];
        let mut pool: Vec<Index> = Vec::new();
        let mut bits: HashMap<Symbol, usize> = HashMap::new();
        let mut bit_of = |idx: &Index, pool: &mut Vec<Index>| -> usize {
            *bits.entry(idx.symbol.clone()).or_insert_with(|| {
                pool.push(idx.clone());
                pool.len() - 1
            })
        };

        let mut pinned = BitSet::new();
        for idx in &target.indices {
            pinned.insert(bit_of(idx, &mut pool));
        }
        let sum_bits: Vec<usize> = t.sums.iter().map(|idx| bit_of(idx, &mut pool)).collect();

        let leaf_indices: Vec<BitSet> = t
            .factors
            .iter()
            .map(|f| f.indices.iter().map(|idx| bit_of(idx, &mut pool)).collect())
            .collect();

        let covered = leaf_indices.iter().fold(BitSet::new(), |acc, s| acc.union(s));
        for (idx, &bit) in t.sums.iter().zip(&sum_bits) {
            if !covered.contains(bit) || scalar_mentions(t, &idx.symbol) {
                pinned.insert(bit);
            }
        }

        let all = (0..t.factors.len()).collect();
        Self {
            comp,
            term,
            target,
            pool,
            bits,
            leaf_indices,
            pinned,
            all,
        }
    }

    pub fn source(&self) -> &'a Term {
        &self.target.terms[self.term]
    }

    pub fn leaf(&self, i: usize) -> &'a Factor {
        &self.source().factors[i]
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_indices.len()
    }

    /// All leaves.
    pub fn all(&self) -> &BitSet {
        &self.all
    }

    pub fn index(&self, bit: usize) -> &Index {
        &self.pool[bit]
    }

    pub fn bit(&self, symbol: &Symbol) -> Option<usize> {
        self.bits.get(symbol).copied()
    }

    pub fn pinned(&self) -> &BitSet {
        &self.pinned
    }

    /// Indices touched by the leaves in `set`.
    pub fn idx(&self, set: &BitSet) -> BitSet {
        let mut out = BitSet::new();
        for leaf in set {
            out.union_with(&self.leaf_indices[leaf]);
        }
        out
    }

    /// Indices of `set` that must stay open: pinned, or shared with leaves
    /// outside `set`.
    pub fn ext(&self, set: &BitSet) -> BitSet {
        let outside = self.idx(&self.all.difference(set));
        self.idx(set).intersection(&outside.union(&self.pinned))
    }

    /// Indices that can be summed inside `set`.
    pub fn internal(&self, set: &BitSet) -> BitSet {
        let idx = self.idx(set);
        idx.difference(&self.ext(set))
    }

    /// Indices an operand exposes to the fusion that consumes it: a bare
    /// leaf exposes all of its indices, an intermediate only its externals.
    pub fn visible(&self, set: &BitSet) -> BitSet {
        if set.len() == 1 {
            self.idx(set)
        } else {
            self.ext(set)
        }
    }

    /// Whether two leaf sets share an index.
    pub fn connected(&self, a: &BitSet, b: &BitSet) -> bool {
        self.idx(a).intersects(&self.idx(b))
    }

    /// Leaves outside `set` sharing an index with it.
    pub fn neighbours(&self, set: &BitSet) -> BitSet {
        let idx = self.idx(set);
        (0..self.leaf_count())
            .filter(|&l| !set.contains(l) && self.leaf_indices[l].intersects(&idx))
            .collect()
    }

    /// Product of the size estimates of the indices in `bits`.
    pub fn size(&self, bits: &BitSet) -> Cost {
        bits.iter().fold(1, |acc: Cost, b| {
            acc.saturating_mul(Cost::from(self.pool[b].range.estimate()))
        })
    }

    /// Cost of fusing the operands `a` and `b` into one intermediate.
    pub fn fuse_cost(&self, a: &BitSet, b: &BitSet) -> Cost {
        let extra = self.power_multiplications(a) + self.power_multiplications(b);
        let loops = self.size(&self.visible(a).union(&self.visible(b)));
        (1 + extra).saturating_mul(loops)
    }

    fn power_multiplications(&self, set: &BitSet) -> Cost {
        match (set.len(), set.first()) {
            (1, Some(leaf)) => Cost::from(self.leaf(leaf).exponent.saturating_sub(1)),
            _ => 0,
        }
    }

    /// Cost of evaluating the whole term as one loop nest.
    pub fn flat_cost(&self) -> Cost {
        term_cost(self.target, self.source())
    }

    /// Canonical form of the subproduct over `set`.
    pub fn canonical(&self, set: &BitSet) -> Canonical {
        let factors: Vec<&Factor> = set.iter().map(|l| self.leaf(l)).collect();
        let ext = self.ext(set);
        canonicalize(&factors, |idx| match self.bit(&idx.symbol) {
            Some(b) if ext.contains(b) => Role::External,
            _ => Role::Summed,
        })
    }
}

fn scalar_mentions(term: &Term, symbol: &Symbol) -> bool {
    term.numerator.depends_on(symbol)
        || term.denominator.depends_on(symbol)
        || term.others.iter().any(|e| e.depends_on(symbol))
}
