//! Equivalence checking by inlining.
//!
//! Inlining substitutes the definition of every referenced computation into
//! its use sites, renaming the definition's dummies to fresh names, until
//! only external tensors remain. Two equation sets agree when every target
//! expands to the same multiset of terms up to factor order and dummy
//! renaming.

use std::collections::{HashMap, HashSet};

use gristmill_core::{
    validate, Computation, EvalSeq, Expr, Factor, Index, Phase, Range, Symbol, Term,
};
use tracing::debug;

use crate::canon::{canonicalize, Role, Signature};
use crate::error::VerifyError;

type Result<T> = std::result::Result<T, VerifyError>;

/// Expand every reference to a computation of `comps` into its definition.
///
/// The result holds one computation per input, in the same order, whose
/// terms mention external tensors only.
pub fn inline_intermediates(comps: &[Computation]) -> Result<Vec<Computation>> {
    validate(comps)?;
    let mut inliner = Inliner {
        defs: comps.iter().map(|c| (c.base.clone(), c)).collect(),
        done: HashMap::new(),
        visiting: HashSet::new(),
        fresh: 0,
    };
    comps
        .iter()
        .map(|comp| {
            Ok(Computation {
                base: comp.base.clone(),
                indices: comp.indices.clone(),
                terms: inliner.expanded(&comp.base)?,
                is_intermediate: comp.is_intermediate,
            })
        })
        .collect()
}

/// Check that `seq` computes every equation of `originals`.
///
/// Both sides are fully inlined first, so references between input
/// equations are allowed and compared by value.
pub fn verify_eval_seq(originals: &[Computation], seq: &EvalSeq) -> Result<()> {
    let expected = inline_intermediates(originals)?;
    let found = inline_intermediates(seq.as_slice())?;
    let found: HashMap<&Symbol, &Computation> = found.iter().map(|c| (&c.base, c)).collect();

    for comp in &expected {
        let Some(other) = found.get(&comp.base) else {
            return Err(VerifyError::MissingTarget {
                target: comp.base.clone(),
            });
        };
        let symbols =
            |c: &Computation| c.indices.iter().map(|i| i.symbol.clone()).collect::<Vec<_>>();
        if symbols(comp) != symbols(other) {
            return Err(VerifyError::IndexMismatch {
                target: comp.base.clone(),
                expected: symbols(comp),
                found: symbols(other),
            });
        }

        let mut remaining: HashMap<TermKey, usize> = HashMap::new();
        for term in &other.terms {
            *remaining.entry(TermKey::new(other, term)).or_insert(0) += 1;
        }
        for term in &comp.terms {
            let key = TermKey::new(comp, term);
            match remaining.get_mut(&key) {
                Some(n) if *n > 0 => *n -= 1,
                _ => {
                    return Err(VerifyError::TermMismatch {
                        target: comp.base.clone(),
                        expected: comp.terms.len(),
                        found: other.terms.len(),
                        unmatched: format!("{term:?}"),
                    })
                }
            }
        }
        if comp.terms.len() != other.terms.len() {
            let extra = other
                .terms
                .iter()
                .find(|t| remaining.get(&TermKey::new(other, t)).is_some_and(|&n| n > 0));
            return Err(VerifyError::TermMismatch {
                target: comp.base.clone(),
                expected: comp.terms.len(),
                found: other.terms.len(),
                unmatched: extra.map(|t| format!("{t:?}")).unwrap_or_default(),
            });
        }
        debug!(target = %comp.base, terms = comp.terms.len(), "target verified");
    }
    Ok(())
}

struct Inliner<'c> {
    defs: HashMap<Symbol, &'c Computation>,
    done: HashMap<Symbol, Vec<Term>>,
    visiting: HashSet<Symbol>,
    fresh: usize,
}

impl<'c> Inliner<'c> {
    /// Fully expanded terms of the computation defining `base`, in that
    /// computation's own index names.
    fn expanded(&mut self, base: &Symbol) -> Result<Vec<Term>> {
        if let Some(terms) = self.done.get(base) {
            return Ok(terms.clone());
        }
        let Some(&comp) = self.defs.get(base) else {
            return Ok(Vec::new());
        };
        if !self.visiting.insert(base.clone()) {
            return Err(VerifyError::Cycle {
                target: base.clone(),
            });
        }
        let mut out = Vec::new();
        for term in &comp.terms {
            out.extend(self.expand_term(comp, term)?);
        }
        self.visiting.remove(base);
        self.done.insert(base.clone(), out.clone());
        Ok(out)
    }

    fn expand_term(&mut self, comp: &Computation, term: &Term) -> Result<Vec<Term>> {
        let mut partials = vec![Term {
            factors: Vec::new(),
            ..term.clone()
        }];
        for factor in &term.factors {
            let Some(&def) = self.defs.get(&factor.base) else {
                for p in &mut partials {
                    p.factors.push(factor.clone());
                }
                continue;
            };
            if factor.exponent != 1 {
                return Err(VerifyError::UnsupportedPower {
                    target: comp.base.clone(),
                    base: factor.base.clone(),
                    exponent: factor.exponent,
                });
            }
            let body = self.expanded(&def.base)?;
            let mut next = Vec::with_capacity(partials.len() * body.len());
            for p in &partials {
                for b in &body {
                    next.push(self.substitute(p, def, factor, b));
                }
            }
            partials = next;
        }
        Ok(partials)
    }

    /// Multiply `partial` by one term of `def`, instantiated at `site`.
    fn substitute(
        &mut self,
        partial: &Term,
        def: &Computation,
        site: &Factor,
        body: &Term,
    ) -> Term {
        let mut rename: HashMap<&Symbol, Index> = def
            .indices
            .iter()
            .zip(&site.indices)
            .map(|(free, actual)| (&free.symbol, actual.clone()))
            .collect();
        let mut sums = partial.sums.clone();
        for s in &body.sums {
            let fresh = s.renamed(format!("{}#{}", s.symbol, self.fresh));
            self.fresh += 1;
            sums.push(fresh.clone());
            rename.insert(&s.symbol, fresh);
        }

        let map_index =
            |idx: &Index| rename.get(&idx.symbol).cloned().unwrap_or_else(|| idx.clone());
        let map_symbol =
            |sym: &Symbol| rename.get(sym).map_or_else(|| sym.clone(), |i| i.symbol.clone());
        let map_expr = |e: &Expr| e.map_deps(map_symbol);

        let mut factors = partial.factors.clone();
        factors.extend(body.factors.iter().map(|f| Factor {
            base: f.base.clone(),
            indices: f.indices.iter().map(map_index).collect(),
            exponent: f.exponent,
        }));
        let mut others = partial.others.clone();
        others.extend(body.others.iter().map(map_expr));

        Term {
            phase: partial.phase * body.phase,
            numerator: combine(&partial.numerator, &map_expr(&body.numerator)),
            denominator: combine(&partial.denominator, &map_expr(&body.denominator)),
            sums,
            factors,
            others,
        }
    }
}

/// Product of two coefficients, independent of operand order.
fn combine(a: &Expr, b: &Expr) -> Expr {
    if a.text() <= b.text() {
        a.mul(b)
    } else {
        b.mul(a)
    }
}

/// A term up to factor order and renaming of its summation dummies.
///
/// Scalar coefficients join the canonical product as extra factors keyed by
/// their text, so a dummy they mention is relabeled together with the
/// tensor slots it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TermKey {
    phase: Phase,
    factors: Signature,
    /// Ranges of summations nothing in the term mentions.
    loose_sums: Vec<Symbol>,
}

impl TermKey {
    fn new(comp: &Computation, term: &Term) -> Self {
        let pinned: HashMap<&Symbol, u32> = comp
            .indices
            .iter()
            .enumerate()
            .map(|(p, i)| (&i.symbol, p as u32))
            .collect();
        let known: HashMap<&Symbol, &Index> = comp
            .indices
            .iter()
            .chain(&term.sums)
            .chain(term.factors.iter().flat_map(|f| &f.indices))
            .map(|i| (&i.symbol, i))
            .collect();
        let unbound = Range::zero_to("", "0");
        let scalar = |kind: char, e: &Expr| {
            let indices = e
                .deps()
                .iter()
                .map(|s| match known.get(s) {
                    Some(&i) => i.clone(),
                    None => Index::new(s.clone(), &unbound),
                })
                .collect();
            Factor::new(format!("\0{kind}{}", e.text()), indices)
        };
        let scalars: Vec<Factor> = [('n', &term.numerator), ('d', &term.denominator)]
            .into_iter()
            .chain(term.others.iter().map(|e| ('o', e)))
            .map(|(kind, e)| scalar(kind, e))
            .collect();

        let refs: Vec<&Factor> = term.factors.iter().chain(&scalars).collect();
        let role = |idx: &Index| match pinned.get(&idx.symbol) {
            Some(&p) => Role::Pinned(p),
            None if term.sums.iter().any(|s| s.symbol == idx.symbol) => Role::Summed,
            None => Role::Named,
        };
        let canon = canonicalize(&refs, role);

        let mentioned: HashSet<&Symbol> = refs
            .iter()
            .flat_map(|f| f.indices.iter().map(|i| &i.symbol))
            .collect();
        let mut loose_sums: Vec<Symbol> = term
            .sums
            .iter()
            .filter(|s| !mentioned.contains(&s.symbol))
            .map(|s| s.range.name().clone())
            .collect();
        loose_sums.sort();

        Self {
            phase: term.phase,
            factors: canon.signature,
            loose_sums,
        }
    }
}
