//! Canonical forms of factor products.
//!
//! Two products describe the same tensor when one can be turned into the
//! other by reordering factors and renaming interchangeable dummies. A
//! [`Signature`] is a representative of that equivalence class: factors are
//! put in a label-free order, ties are resolved by trying permutations of
//! tied factors, and every relabelable index is replaced by its role, range
//! and first-appearance ordinal.
//!
//! Equal signatures always mean isomorphic products. The converse holds as
//! long as the number of tie permutations stays below
//! [`MAX_TIE_PERMUTATIONS`]; past that the first order is taken as is.

use std::collections::HashMap;

use gristmill_core::{Factor, Index, Symbol};

/// Upper bound on factor orders tried while breaking ties.
pub const MAX_TIE_PERMUTATIONS: usize = 5040;

/// How an index takes part in a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Fixed position of an outer target; never renamed.
    Pinned(u32),
    /// Kept by name.
    Named,
    /// Visible outside the product; renamed within its range.
    External,
    /// Summed inside the product; renamed within its range.
    Summed,
}

/// An index after relabeling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotLabel {
    Pinned(u32),
    Named(Symbol),
    External { range: Symbol, ordinal: u32 },
    Summed { range: Symbol, ordinal: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonFactor {
    pub base: Symbol,
    pub exponent: u32,
    pub slots: Vec<SlotLabel>,
}

/// Canonical representative of a product up to reordering and renaming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(Vec<CanonFactor>);

impl Signature {
    pub fn factors(&self) -> &[CanonFactor] {
        &self.0
    }
}

/// A signature together with how one concrete product maps onto it.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub signature: Signature,
    /// External indices of this product, in canonical slot order.
    pub externals: Vec<Index>,
    /// Summed indices of this product, in canonical slot order.
    pub summed: Vec<Index>,
    /// Positions into the input factor slice, in canonical order.
    pub factor_order: Vec<usize>,
}

/// Label-free view of a slot, used to order factors before relabeling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Shape {
    Pinned(u32),
    Named(Symbol),
    External(Symbol),
    Summed(Symbol),
}

type ShapeKey = (Symbol, u32, Vec<Shape>);

/// Canonicalize a product of `factors`, classifying every index through
/// `role`.
pub fn canonicalize(factors: &[&Factor], role: impl Fn(&Index) -> Role) -> Canonical {
    let keys: Vec<ShapeKey> = factors
        .iter()
        .map(|f| {
            let shapes = f
                .indices
                .iter()
                .map(|idx| match role(idx) {
                    Role::Pinned(p) => Shape::Pinned(p),
                    Role::Named => Shape::Named(idx.symbol.clone()),
                    Role::External => Shape::External(idx.range.name().clone()),
                    Role::Summed => Shape::Summed(idx.range.name().clone()),
                })
                .collect();
            (f.base.clone(), f.exponent, shapes)
        })
        .collect();

    let mut order: Vec<usize> = (0..factors.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]).then(a.cmp(&b)));

    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=order.len() {
        if i == order.len() || keys[order[i]] != keys[order[start]] {
            if i - start > 1 {
                groups.push((start, i));
            }
            start = i;
        }
    }

    let permutations = groups
        .iter()
        .try_fold(1usize, |acc, &(s, e)| acc.checked_mul(factorial(e - s)?));
    let exhaustive = permutations.is_some_and(|p| p <= MAX_TIE_PERMUTATIONS);

    let mut best = relabel(factors, &order, &role);
    if exhaustive {
        'orders: loop {
            for &(s, e) in &groups {
                if next_permutation(&mut order[s..e]) {
                    let candidate = relabel(factors, &order, &role);
                    if candidate.signature < best.signature {
                        best = candidate;
                    }
                    continue 'orders;
                }
            }
            break;
        }
    }
    best
}

fn relabel(factors: &[&Factor], order: &[usize], role: &impl Fn(&Index) -> Role) -> Canonical {
    let mut labels: HashMap<&Symbol, SlotLabel> = HashMap::new();
    let mut counters: HashMap<(bool, &Symbol), u32> = HashMap::new();
    let mut externals = Vec::new();
    let mut summed = Vec::new();

    let canon = order
        .iter()
        .map(|&pos| {
            let f = factors[pos];
            let slots = f
                .indices
                .iter()
                .map(|idx| {
                    if let Some(label) = labels.get(&idx.symbol) {
                        return label.clone();
                    }
                    let label = match role(idx) {
                        Role::Pinned(p) => SlotLabel::Pinned(p),
                        Role::Named => SlotLabel::Named(idx.symbol.clone()),
                        r @ (Role::External | Role::Summed) => {
                            let external = r == Role::External;
                            let counter = counters.entry((external, idx.range.name())).or_insert(0);
                            let ordinal = *counter;
                            *counter += 1;
                            let range = idx.range.name().clone();
                            if external {
                                externals.push(idx.clone());
                                SlotLabel::External { range, ordinal }
                            } else {
                                summed.push(idx.clone());
                                SlotLabel::Summed { range, ordinal }
                            }
                        }
                    };
                    labels.insert(&idx.symbol, label.clone());
                    label
                })
                .collect();
            CanonFactor {
                base: f.base.clone(),
                exponent: f.exponent,
                slots,
            }
        })
        .collect();

    Canonical {
        signature: Signature(canon),
        externals,
        summed,
        factor_order: order.to_vec(),
    }
}

fn factorial(n: usize) -> Option<usize> {
    (2..=n).try_fold(1usize, |acc, k| acc.checked_mul(k))
}

/// Advance `xs` to the next lexicographic permutation. On the last one,
/// reset to ascending order and return `false`.
fn next_permutation(xs: &mut [usize]) -> bool {
    if xs.len() < 2 {
        return false;
    }
    let mut i = xs.len() - 1;
    while i > 0 && xs[i - 1] >= xs[i] {
        i -= 1;
    }
    if i == 0 {
        xs.reverse();
        return false;
    }
    let mut j = xs.len() - 1;
    while xs[j] <= xs[i - 1] {
        j -= 1;
    }
    xs.swap(i - 1, j);
    xs[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use gristmill_core::{indices, Range};

    fn ext_unless_summed<'a>(summed: &'a [&'a str]) -> impl Fn(&Index) -> Role + 'a {
        move |idx| {
            if summed.contains(&idx.symbol.as_str()) {
                Role::Summed
            } else {
                Role::External
            }
        }
    }

    fn pin(order: [&'static str; 2]) -> impl Fn(&Index) -> Role {
        move |idx| {
            let p = order.iter().position(|s| *s == idx.symbol.as_str());
            Role::Pinned(p.unwrap_or(0) as u32)
        }
    }

    #[test]
    fn test_next_permutation_cycles() {
        let mut xs = vec![0, 1, 2];
        let mut seen = vec![xs.clone()];
        while next_permutation(&mut xs) {
            seen.push(xs.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(xs, vec![0, 1, 2]);
    }

    #[test]
    fn test_invariant_under_reorder_and_renaming() {
        let r = Range::zero_to("R", "n");
        let i = indices(&r, &["a", "b", "c", "p", "q", "s"]);
        let x1 = Factor::new("x", vec![i[0].clone(), i[2].clone()]);
        let y1 = Factor::new("y", vec![i[2].clone(), i[1].clone()]);
        let first = canonicalize(&[&x1, &y1], ext_unless_summed(&["c"]));

        let y2 = Factor::new("y", vec![i[5].clone(), i[4].clone()]);
        let x2 = Factor::new("x", vec![i[3].clone(), i[5].clone()]);
        let second = canonicalize(&[&y2, &x2], ext_unless_summed(&["s"]));

        assert_eq!(first.signature, second.signature);
        assert_eq!(second.factor_order, vec![1, 0]);
        let ext1: Vec<&str> = first.externals.iter().map(|i| i.symbol.as_str()).collect();
        let ext2: Vec<&str> = second.externals.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(ext1, ["a", "b"]);
        assert_eq!(ext2, ["p", "q"]);
        assert_eq!(second.summed[0].symbol.as_str(), "s");
    }

    #[test]
    fn test_distinguishes_roles_and_ranges() {
        let r = Range::zero_to("R", "n");
        let v = Range::zero_to("V", "m");
        let i = indices(&r, &["a", "b", "c"]);
        let x = Factor::new("x", vec![i[0].clone(), i[2].clone()]);
        let y = Factor::new("y", vec![i[2].clone(), i[1].clone()]);
        let summed = canonicalize(&[&x, &y], ext_unless_summed(&["c"]));
        let open = canonicalize(&[&x, &y], ext_unless_summed(&[]));
        assert_ne!(summed.signature, open.signature);

        let cv = Index::new("c", &v);
        let xv = Factor::new("x", vec![i[0].clone(), cv.clone()]);
        let yv = Factor::new("y", vec![cv, i[1].clone()]);
        let other_range = canonicalize(&[&xv, &yv], ext_unless_summed(&["c"]));
        assert_ne!(summed.signature, other_range.signature);
    }

    #[test]
    fn test_ties_resolved_by_permutation() {
        // x[a,c] x[b,d] y[d,c]: both x factors share a label-free key and
        // only the swapped order yields the smallest labeling of y.
        let r = Range::zero_to("R", "n");
        let i = indices(&r, &["a", "b", "c", "d"]);
        let x1 = Factor::new("x", vec![i[0].clone(), i[2].clone()]);
        let x2 = Factor::new("x", vec![i[1].clone(), i[3].clone()]);
        let y = Factor::new("y", vec![i[3].clone(), i[2].clone()]);
        let summed = ["c", "d"];
        let one = canonicalize(&[&x1, &x2, &y], ext_unless_summed(&summed));
        let two = canonicalize(&[&x2, &x1, &y], ext_unless_summed(&summed));
        assert_eq!(one.signature, two.signature);
        assert_eq!(one.factor_order, vec![1, 0, 2]);
        assert_eq!(two.factor_order, vec![0, 1, 2]);
        let ext: Vec<&str> = one.externals.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(ext, ["b", "a"]);
    }

    #[test]
    fn test_pinned_positions_kept() {
        let r = Range::zero_to("R", "n");
        let i = indices(&r, &["a", "b"]);
        let x = Factor::new("x", vec![i[0].clone(), i[1].clone()]);
        let ab = canonicalize(&[&x], pin(["a", "b"]));
        let ba = canonicalize(&[&x], pin(["b", "a"]));
        assert_ne!(ab.signature, ba.signature);
        assert!(ab.externals.is_empty());
    }
}
