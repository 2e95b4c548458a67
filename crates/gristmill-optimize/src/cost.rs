//! Arithmetic cost model.
//!
//! Cost counts scalar multiplications: a term evaluated as one loop nest
//! performs `(sum of exponents - 1)` multiplications at every point of its
//! loop space, and the loop space is the product of the size estimates of
//! its free and summation indices. All arithmetic saturates.

use gristmill_core::{Computation, Index, Term};

/// Estimated multiplication count.
pub type Cost = u128;

/// Product of the size estimates of `indices`.
pub fn loop_size<'a>(indices: impl IntoIterator<Item = &'a Index>) -> Cost {
    indices
        .into_iter()
        .fold(1, |acc: Cost, idx| acc.saturating_mul(Cost::from(idx.range.estimate())))
}

/// Cost of evaluating `term` of `comp` as a single loop nest.
pub fn term_cost(comp: &Computation, term: &Term) -> Cost {
    let mults = Cost::from(term.multiplications());
    if mults == 0 {
        return 0;
    }
    mults.saturating_mul(loop_size(comp.indices.iter().chain(&term.sums)))
}

/// Cost of evaluating every term of every computation.
pub fn flop_cost(comps: &[Computation]) -> Cost {
    comps
        .iter()
        .flat_map(|c| c.terms.iter().map(move |t| term_cost(c, t)))
        .fold(0, Cost::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gristmill_core::{indices, Factor, Range};

    #[test]
    fn test_matmul_cost() {
        let r = Range::zero_to("R", "n").with_estimate(10);
        let idx = indices(&r, &["a", "b", "c"]);
        let (a, b, c) = (idx[0].clone(), idx[1].clone(), idx[2].clone());
        let comp = Computation::new("r", vec![a.clone(), b.clone()]).with_term(
            Term::product(vec![
                Factor::new("x", vec![a, c.clone()]),
                Factor::new("y", vec![c.clone(), b]),
            ])
            .summed(vec![c]),
        );
        assert_eq!(term_cost(&comp, &comp.terms[0]), 1000);
        assert_eq!(flop_cost(&[comp.clone(), comp]), 2000);
    }

    #[test]
    fn test_powers_and_copies() {
        let r = Range::zero_to("R", "n").with_estimate(3);
        let a = indices(&r, &["a"]);
        let comp = Computation::new("r", a.clone())
            .with_term(Term::product(vec![Factor::new("x", a.clone())]))
            .with_term(Term::product(vec![Factor::new("u", a).pow(3)]));
        assert_eq!(term_cost(&comp, &comp.terms[0]), 0);
        assert_eq!(term_cost(&comp, &comp.terms[1]), 6);
    }

    #[test]
    fn test_saturates() {
        let r = Range::zero_to("R", "n").with_estimate(u64::MAX);
        let many = indices(&r, &["a", "b", "c", "d", "e"]);
        assert_eq!(loop_size(&many), Cost::MAX);
    }
}
