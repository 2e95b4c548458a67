//! Rendering contexts: computations flattened into the strings printers
//! paste into their templates.

use std::fmt;
use std::sync::Arc;

use gristmill_core::{Computation, Factor, Index, Phase, Symbol, Term};

use crate::error::ContextError;

/// Name-mangling policy: `(base, number of indices) -> name`.
pub type MangleFn = Arc<dyn Fn(&str, usize) -> String + Send + Sync>;

/// Power policy: `(mangled base, exponent) -> name`, applied to factors
/// with an exponent other than one.
pub type PowerFn = Arc<dyn Fn(&str, u32) -> String + Send + Sync>;

/// An index with its range rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexContext {
    pub index: String,
    pub range: String,
    pub lower: String,
    pub upper: String,
    pub size: String,
}

/// One indexed factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorContext {
    /// Mangled base, with the exponent folded in by the power policy.
    pub base: String,
    pub indices: Vec<IndexContext>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermContext {
    pub phase: Phase,
    pub numerator: String,
    pub denominator: String,
    pub sums: Vec<IndexContext>,
    pub indexed_factors: Vec<FactorContext>,
    pub other_factors: Vec<String>,
}

/// Everything a printer needs about one computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputationContext {
    /// Name of the computation in the evaluation sequence.
    pub name: Symbol,
    /// Mangled target name.
    pub base: String,
    pub indices: Vec<IndexContext>,
    pub terms: Vec<TermContext>,
    pub is_intermediate: bool,
}

impl ComputationContext {
    /// Context of term `i`.
    pub fn term(&self, i: usize) -> Result<&TermContext, ContextError> {
        self.terms.get(i).ok_or_else(|| ContextError::TermOutOfRange {
            target: self.name.clone(),
            term: i,
            len: self.terms.len(),
        })
    }
}

/// Builds [`ComputationContext`]s under configurable naming policies.
///
/// # Example
///
/// ```
/// use gristmill_generate::ContextBuilder;
///
/// let builder = ContextBuilder::new().with_mangle(|base, n| format!("{base}{n}"));
/// # let _ = builder;
/// ```
#[derive(Clone)]
pub struct ContextBuilder {
    mangle: MangleFn,
    power: PowerFn,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            mangle: Arc::new(|base, _| base.to_string()),
            power: Arc::new(|base, exponent| format!("{base}**{exponent}")),
        }
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder").finish_non_exhaustive()
    }
}

impl ContextBuilder {
    /// Identity mangling, `base**e` powers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mangle<F>(mut self, mangle: F) -> Self
    where
        F: Fn(&str, usize) -> String + Send + Sync + 'static,
    {
        self.mangle = Arc::new(mangle);
        self
    }

    pub fn with_power<F>(mut self, power: F) -> Self
    where
        F: Fn(&str, u32) -> String + Send + Sync + 'static,
    {
        self.power = Arc::new(power);
        self
    }

    pub fn build(&self, comp: &Computation) -> ComputationContext {
        ComputationContext {
            name: comp.base.clone(),
            base: (self.mangle)(comp.base.as_str(), comp.indices.len()),
            indices: index_contexts(&comp.indices),
            terms: comp.terms.iter().map(|t| self.term(t)).collect(),
            is_intermediate: comp.is_intermediate,
        }
    }

    fn term(&self, term: &Term) -> TermContext {
        TermContext {
            phase: term.phase,
            numerator: term.numerator.text().to_string(),
            denominator: term.denominator.text().to_string(),
            sums: index_contexts(&term.sums),
            indexed_factors: term.factors.iter().map(|f| self.factor(f)).collect(),
            other_factors: term.others.iter().map(|e| e.text().to_string()).collect(),
        }
    }

    fn factor(&self, factor: &Factor) -> FactorContext {
        let base = (self.mangle)(factor.base.as_str(), factor.indices.len());
        let base = if factor.exponent == 1 {
            base
        } else {
            (self.power)(&base, factor.exponent)
        };
        FactorContext {
            base,
            indices: index_contexts(&factor.indices),
        }
    }
}

fn index_contexts(indices: &[Index]) -> Vec<IndexContext> {
    indices
        .iter()
        .map(|idx| IndexContext {
            index: idx.symbol.to_string(),
            range: idx.range.name().to_string(),
            lower: idx.range.lower().text().to_string(),
            upper: idx.range.upper().text().to_string(),
            size: idx.range.size().text().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gristmill_core::{indices, Range};

    #[test]
    fn test_defaults() {
        let r = Range::new("L", "1", "m", "m");
        let comp = Computation::new("t", indices(&r, &["i"])).with_term(
            Term::product(vec![Factor::new("x", indices(&r, &["i"])).pow(3)]),
        );
        let ctx = ContextBuilder::default().build(&comp);
        assert_eq!(ctx.base, "t");
        assert_eq!(
            ctx.indices,
            vec![IndexContext {
                index: "i".into(),
                range: "L".into(),
                lower: "1".into(),
                upper: "m".into(),
                size: "m".into(),
            }]
        );
        let term = ctx.term(0).unwrap();
        assert_eq!(term.indexed_factors[0].base, "x**3");
        assert_eq!(term.numerator, "1");
        assert_eq!(term.denominator, "1");
    }

    #[test]
    fn test_custom_power() {
        let r = Range::zero_to("R", "n");
        let comp = Computation::new("t", vec![]).with_term(Term::product(vec![
            Factor::new("x", indices(&r, &["a"])).pow(2),
        ]).summed(indices(&r, &["a"])));
        let ctx = ContextBuilder::new()
            .with_power(|base, e| format!("pow({base}, {e})"))
            .build(&comp);
        assert_eq!(ctx.terms[0].indexed_factors[0].base, "pow(x, 2)");
    }

    #[test]
    fn test_term_out_of_range() {
        let ctx = ContextBuilder::new().build(&Computation::new("t", vec![]));
        assert_eq!(
            ctx.term(0),
            Err(ContextError::TermOutOfRange {
                target: "t".into(),
                term: 0,
                len: 0,
            })
        );
    }
}
