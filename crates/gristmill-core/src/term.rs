//! Factors, terms and computations.

use std::fmt;
use std::ops::Mul;

use crate::range::Index;
use crate::symbol::{Expr, Symbol};

/// Overall sign of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
    #[default]
    Plus,
    Minus,
}

impl Phase {
    pub fn flip(self) -> Self {
        match self {
            Phase::Plus => Phase::Minus,
            Phase::Minus => Phase::Plus,
        }
    }
}

impl Mul for Phase {
    type Output = Phase;

    fn mul(self, rhs: Phase) -> Phase {
        if self == rhs {
            Phase::Plus
        } else {
            Phase::Minus
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Plus => f.write_str("+"),
            Phase::Minus => f.write_str("-"),
        }
    }
}

/// One indexed-tensor access inside a term.
///
/// `exponent > 1` is an elementwise power of the same access, not a second
/// access.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Factor {
    pub base: Symbol,
    pub indices: Vec<Index>,
    pub exponent: u32,
}

impl Factor {
    pub fn new(base: impl Into<Symbol>, indices: Vec<Index>) -> Self {
        Self {
            base: base.into(),
            indices,
            exponent: 1,
        }
    }

    /// Raise the access to an integer power.
    pub fn pow(mut self, exponent: u32) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn rank(&self) -> usize {
        self.indices.len()
    }
}

impl fmt::Debug for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.base, self.indices)?;
        if self.exponent != 1 {
            write!(f, "^{}", self.exponent)?;
        }
        Ok(())
    }
}

/// A signed, scaled product of factors summed over dummy indices.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Term {
    pub phase: Phase,
    pub numerator: Expr,
    pub denominator: Expr,
    /// Summation indices. Free indices of the owning computation never
    /// appear here.
    pub sums: Vec<Index>,
    pub factors: Vec<Factor>,
    /// Scalar factors not modelled structurally.
    pub others: Vec<Expr>,
}

impl Term {
    /// The empty product `+1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A plain product of factors.
    pub fn product(factors: Vec<Factor>) -> Self {
        Self {
            factors,
            ..Self::default()
        }
    }

    pub fn with_factor(mut self, factor: Factor) -> Self {
        self.factors.push(factor);
        self
    }

    pub fn summed(mut self, sums: Vec<Index>) -> Self {
        self.sums.extend(sums);
        self
    }

    pub fn with_coefficient(
        mut self,
        numerator: impl Into<Expr>,
        denominator: impl Into<Expr>,
    ) -> Self {
        self.numerator = numerator.into();
        self.denominator = denominator.into();
        self
    }

    pub fn with_other(mut self, other: Expr) -> Self {
        self.others.push(other);
        self
    }

    pub fn negated(mut self) -> Self {
        self.phase = self.phase.flip();
        self
    }

    /// Whether the term is a bare product: `+1 * factors`, with no scalar
    /// payload of any kind.
    pub fn is_pure_product(&self) -> bool {
        self.phase == Phase::Plus
            && self.numerator.is_one()
            && self.denominator.is_one()
            && self.others.is_empty()
    }

    /// Whether any factor of the term has the given base.
    pub fn references(&self, base: &Symbol) -> bool {
        self.factors.iter().any(|f| &f.base == base)
    }

    /// Total number of multiplications per loop point:
    /// `(sum of exponents) - 1`, or zero for an empty product.
    pub fn multiplications(&self) -> u64 {
        let accesses: u64 = self.factors.iter().map(|f| u64::from(f.exponent)).sum();
        accesses.saturating_sub(1)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase)?;
        if !self.sums.is_empty() {
            write!(f, "sum{:?} ", self.sums)?;
        }
        write!(f, "{}/{}", self.numerator, self.denominator)?;
        for factor in &self.factors {
            write!(f, " {:?}", factor)?;
        }
        for other in &self.others {
            write!(f, " {}", other)?;
        }
        Ok(())
    }
}

/// A named tensor defined as a sum of terms.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Computation {
    pub base: Symbol,
    pub indices: Vec<Index>,
    pub terms: Vec<Term>,
    /// Consumed only inside the evaluation; never handed back to the
    /// caller. Unflagged computations are results.
    pub is_intermediate: bool,
}

impl Computation {
    /// A result computation with no terms yet.
    pub fn new(base: impl Into<Symbol>, indices: Vec<Index>) -> Self {
        Self {
            base: base.into(),
            indices,
            terms: Vec::new(),
            is_intermediate: false,
        }
    }

    pub fn with_term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    pub fn with_terms(mut self, terms: impl IntoIterator<Item = Term>) -> Self {
        self.terms.extend(terms);
        self
    }

    /// Flag the computation as an intermediate.
    pub fn intermediate(mut self) -> Self {
        self.is_intermediate = true;
        self
    }

    pub fn rank(&self) -> usize {
        self.indices.len()
    }

    /// The computation's target viewed as a factor, with its own indices.
    pub fn target(&self) -> Factor {
        Factor::new(self.base.clone(), self.indices.clone())
    }

    /// Whether any term references the given base.
    pub fn references(&self, base: &Symbol) -> bool {
        self.terms.iter().any(|t| t.references(base))
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?} =", self.base, self.indices)?;
        for term in &self.terms {
            write!(f, " {:?}", term)?;
        }
        if self.is_intermediate {
            write!(f, " (intermediate)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{indices, Range};

    #[test]
    fn test_phase_algebra() {
        assert_eq!(Phase::Minus * Phase::Minus, Phase::Plus);
        assert_eq!(Phase::Plus * Phase::Minus, Phase::Minus);
        assert_eq!(Phase::Plus.flip(), Phase::Minus);
        assert_eq!(Phase::Minus.to_string(), "-");
    }

    #[test]
    fn test_multiplications_counts_exponents() {
        let r = Range::zero_to("R", "n");
        let ab = indices(&r, &["a", "b"]);
        let t = Term::new()
            .with_factor(Factor::new("u", ab.clone()).pow(2))
            .with_factor(Factor::new("v", ab));
        assert_eq!(t.multiplications(), 2);
        assert_eq!(Term::new().multiplications(), 0);
    }

    #[test]
    fn test_pure_product() {
        let r = Range::zero_to("R", "n");
        let a = indices(&r, &["a"]);
        let t = Term::product(vec![Factor::new("x", a)]);
        assert!(t.is_pure_product());
        assert!(!t.clone().negated().is_pure_product());
        assert!(!t.with_coefficient("2", "1").is_pure_product());
    }

    #[test]
    fn test_computation_references() {
        let r = Range::zero_to("R", "n");
        let ab = indices(&r, &["a", "b"]);
        let c = Computation::new("y", ab.clone())
            .with_term(Term::product(vec![Factor::new("x", ab)]))
            .intermediate();
        assert!(c.is_intermediate);
        assert!(c.references(&Symbol::new("x")));
        assert!(!c.references(&Symbol::new("y")));
        assert_eq!(c.target().rank(), 2);
    }
}
