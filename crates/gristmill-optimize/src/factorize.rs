//! Whole-set factorization: search every term, then rewrite the equations
//! around shared intermediates.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use gristmill_core::{validate, Computation, EvalSeq, Factor, Symbol, Term};
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::canon::Signature;
use crate::cost::{flop_cost, Cost};
use crate::error::{OptimizeError, Result};
use crate::memo::{Definition, SignatureMemo};
use crate::network::TermNetwork;
use crate::options::OptimizeOptions;
use crate::search::{
    cached_canonical, collect_frontier, search_term, CanonCache, ContractionTree, SearchOutcome,
};

/// Summary of one optimizer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Some term ran out of budget and kept its greedy tree.
    pub degraded: bool,
    /// `(target, term)` of every degraded term.
    pub degraded_terms: Vec<(Symbol, usize)>,
    /// Candidate fusions evaluated across all terms.
    pub nodes_searched: u64,
    /// Cost of the input evaluated as written.
    pub naive_cost: Cost,
    /// Cost of the returned sequence.
    pub optimized_cost: Cost,
    /// Number of new intermediate computations.
    pub intermediates: usize,
}

/// An optimized evaluation sequence and how it was found.
#[derive(Debug, Clone)]
pub struct Optimized {
    pub seq: EvalSeq,
    pub report: OptimizeReport,
}

struct TermWork<'a> {
    net: TermNetwork<'a>,
    cache: CanonCache,
    outcome: Option<SearchOutcome>,
}

/// Rewrite `equations` into a cheaper, equivalent evaluation sequence.
///
/// Every input computation is kept, in order, with the intermediates it
/// introduces placed right before it.
#[instrument(skip_all, fields(equations = equations.len()))]
pub fn optimize(equations: &[Computation], options: &OptimizeOptions) -> Result<Optimized> {
    if !(options.flat_threshold.is_finite() && options.flat_threshold > 0.0) {
        return Err(OptimizeError::InvalidThreshold(options.flat_threshold));
    }
    validate(equations)?;
    let deadline = options.time_budget.map(|budget| Instant::now() + budget);

    let mut work: Vec<TermWork<'_>> = equations
        .iter()
        .enumerate()
        .flat_map(|(c, comp)| {
            (0..comp.terms.len()).map(move |t| TermWork {
                net: TermNetwork::new(c, t, comp),
                cache: CanonCache::new(),
                outcome: None,
            })
        })
        .collect();

    let memo = SignatureMemo::new();
    let frontier = |w: &mut TermWork<'_>| {
        let frontier = collect_frontier(&w.net, options.node_budget, deadline);
        if frontier.truncated {
            debug!(target = %w.net.target.base, term = w.net.term, "frontier truncated");
        }
        memo.record_term(&frontier.signatures);
        w.cache = frontier.cache;
    };
    if options.parallel {
        work.par_iter_mut().for_each(frontier);
    } else {
        work.iter_mut().for_each(frontier);
    }

    let reuse: HashMap<Signature, u32> = if options.share_intermediates {
        memo.reuse_table()
    } else {
        HashMap::new()
    };
    let search = |w: &mut TermWork<'_>| {
        if w.net.leaf_count() < 2 {
            return;
        }
        let outcome = search_term(&w.net, &mut w.cache, &reuse, options, deadline);
        debug!(
            target = %w.net.target.base,
            term = w.net.term,
            nodes = outcome.nodes,
            score = outcome.score,
            cost = outcome.cost,
            "term searched"
        );
        w.outcome = Some(outcome);
    };
    if options.parallel {
        work.par_iter_mut().for_each(search);
    } else {
        work.iter_mut().for_each(search);
    }

    let mut report = OptimizeReport {
        naive_cost: flop_cost(equations),
        ..Default::default()
    };
    for w in &work {
        let Some(outcome) = &w.outcome else { continue };
        report.nodes_searched = report.nodes_searched.saturating_add(outcome.nodes);
        if outcome.degraded {
            warn!(
                target = %w.net.target.base,
                term = w.net.term,
                "search budget exhausted, keeping the greedy tree"
            );
            report.degraded = true;
            report.degraded_terms.push((w.net.target.base.clone(), w.net.term));
        }
    }

    let mut materializer = Materializer::new(equations, options, &memo);
    materializer.count_occurrences(&mut work);
    let comps = materializer.run(equations, &mut work);
    report.intermediates = materializer.created_total;
    report.optimized_cost = flop_cost(&comps);
    info!(
        naive = report.naive_cost,
        optimized = report.optimized_cost,
        intermediates = report.intermediates,
        degraded = report.degraded,
        "optimization finished"
    );

    Ok(Optimized {
        seq: EvalSeq::new(comps)?,
        report,
    })
}

// ============================================================================
// Materialization
// ============================================================================

/// Fresh names for intermediates, avoiding every name the input uses.
struct NameGen {
    format: String,
    next: usize,
    taken: HashSet<Symbol>,
}

impl NameGen {
    fn new(format: &str, equations: &[Computation]) -> Self {
        let mut taken = HashSet::new();
        for comp in equations {
            taken.insert(comp.base.clone());
            for term in &comp.terms {
                taken.extend(term.factors.iter().map(|f| f.base.clone()));
            }
        }
        Self {
            format: format.to_string(),
            next: 0,
            taken,
        }
    }

    fn fresh(&mut self) -> Symbol {
        loop {
            let n = self.next.to_string();
            self.next += 1;
            let name = if self.format.contains("{}") {
                self.format.replacen("{}", &n, 1)
            } else {
                format!("{}{}", self.format, n)
            };
            let name = Symbol::from(name);
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}

struct Materializer<'o> {
    options: &'o OptimizeOptions,
    memo: &'o SignatureMemo,
    names: NameGen,
    counts: HashMap<Signature, u32>,
    created: Vec<Computation>,
    created_total: usize,
}

/// Per-term state threaded through [`Materializer::collect`].
struct TermPlan<'t, 'a> {
    net: &'t TermNetwork<'a>,
    tree: &'t ContractionTree,
    /// Every non-root fusion becomes an intermediate.
    factorized: bool,
    /// The term alone defines its computation; keep the root inline.
    root_inline: bool,
}

impl<'o> Materializer<'o> {
    fn new(
        equations: &[Computation],
        options: &'o OptimizeOptions,
        memo: &'o SignatureMemo,
    ) -> Self {
        Self {
            options,
            memo,
            names: NameGen::new(&options.interm_format, equations),
            counts: HashMap::new(),
            created: Vec::new(),
            created_total: 0,
        }
    }

    /// Count how often every fused product occurs across the chosen trees.
    fn count_occurrences(&mut self, work: &mut [TermWork<'_>]) {
        if !self.options.share_intermediates {
            return;
        }
        for w in work.iter_mut() {
            let Some(outcome) = &w.outcome else { continue };
            for node in outcome.tree.fusions() {
                let canon = cached_canonical(&mut w.cache, &w.net, &node.set);
                *self.counts.entry(canon.signature.clone()).or_insert(0) += 1;
            }
        }
    }

    fn run(&mut self, equations: &[Computation], work: &mut [TermWork<'_>]) -> Vec<Computation> {
        let mut out = Vec::with_capacity(equations.len());
        let mut cursor = 0;
        for comp in equations {
            let span = &mut work[cursor..cursor + comp.terms.len()];
            cursor += comp.terms.len();
            let seed = self.seed_slots(comp, span);

            let terms = span
                .iter_mut()
                .map(|w| self.rewrite_term(w, seed.is_some()))
                .collect();
            out.append(&mut self.created);
            out.push(Computation {
                base: comp.base.clone(),
                indices: comp.indices.clone(),
                terms,
                is_intermediate: comp.is_intermediate,
            });

            if let (Some(slots), [w]) = (seed, &mut *span) {
                let canon = cached_canonical(&mut w.cache, &w.net, w.net.all());
                self.memo.define(
                    &canon.signature,
                    Definition {
                        base: comp.base.clone(),
                        slots,
                    },
                );
            }
        }
        out
    }

    /// If `comp` is a single bare product whose open indices are exactly its
    /// free indices, the slot feeding each free index.
    fn seed_slots(&self, comp: &Computation, span: &mut [TermWork<'_>]) -> Option<Vec<usize>> {
        if !self.options.share_intermediates {
            return None;
        }
        let [w] = span else { return None };
        if !w.net.source().is_pure_product() || w.net.leaf_count() < 2 {
            return None;
        }
        let canon = cached_canonical(&mut w.cache, &w.net, w.net.all());
        if canon.externals.len() != comp.rank() {
            return None;
        }
        comp.indices
            .iter()
            .map(|idx| canon.externals.iter().position(|e| e.symbol == idx.symbol))
            .collect()
    }

    fn rewrite_term(&mut self, w: &mut TermWork<'_>, root_inline: bool) -> Term {
        let source = w.net.source();
        let Some(outcome) = &w.outcome else {
            return source.clone();
        };
        let flat = w.net.flat_cost();
        let plan = TermPlan {
            net: &w.net,
            tree: &outcome.tree,
            factorized: (outcome.cost as f64) < self.options.flat_threshold * (flat as f64),
            root_inline,
        };
        let factors = self.collect(&plan, &mut w.cache, outcome.tree.root, true);

        let covered = w.net.idx(w.net.all());
        let used: HashSet<&Symbol> = factors
            .iter()
            .flat_map(|f| f.indices.iter().map(|i| &i.symbol))
            .collect();
        let sums = source
            .sums
            .iter()
            .filter(|s| {
                used.contains(&s.symbol)
                    || w.net.bit(&s.symbol).map_or(true, |b| !covered.contains(b))
            })
            .cloned()
            .collect();

        Term {
            phase: source.phase,
            numerator: source.numerator.clone(),
            denominator: source.denominator.clone(),
            sums,
            factors,
            others: source.others.clone(),
        }
    }

    /// Factors standing for `node` at its parent's level.
    fn collect(
        &mut self,
        plan: &TermPlan<'_, '_>,
        cache: &mut CanonCache,
        node: usize,
        is_root: bool,
    ) -> Vec<Factor> {
        let Some((left, right)) = plan.tree.nodes[node].children else {
            return vec![plan.net.leaf(node).clone()];
        };
        let share = self.options.share_intermediates;
        let canon = cached_canonical(cache, plan.net, &plan.tree.nodes[node].set);
        if share {
            if let Some(def) = self.memo.lookup(&canon.signature) {
                return vec![def.reference(&canon.externals)];
            }
        }

        let shared = share && self.counts.get(&canon.signature).is_some_and(|&n| n >= 2);
        let materialize = if is_root {
            shared && !plan.root_inline
        } else {
            shared || plan.factorized
        };

        let mut factors = self.collect(plan, cache, left, false);
        factors.extend(self.collect(plan, cache, right, false));
        if !materialize {
            return factors;
        }

        let used: HashSet<&Symbol> = factors
            .iter()
            .flat_map(|f| f.indices.iter().map(|i| &i.symbol))
            .collect();
        let sums = canon
            .summed
            .iter()
            .filter(|idx| used.contains(&idx.symbol))
            .cloned()
            .collect();

        let base = self.names.fresh();
        debug!(
            intermediate = %base,
            target = %plan.net.target.base,
            term = plan.net.term,
            rank = canon.externals.len(),
            "new intermediate"
        );
        self.created.push(Computation {
            base: base.clone(),
            indices: canon.externals.clone(),
            terms: vec![Term::product(factors).summed(sums)],
            is_intermediate: true,
        });
        self.created_total += 1;

        let def = Definition::canonical(base, canon.externals.len());
        let def = if share {
            self.memo.define(&canon.signature, def)
        } else {
            def
        };
        vec![def.reference(&canon.externals)]
    }
}
