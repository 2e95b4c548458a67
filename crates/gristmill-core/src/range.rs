//! Index domains and indices.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::symbol::{Expr, Symbol};

/// Size assumed for a range when the caller gives no estimate.
pub const DEFAULT_SIZE_ESTIMATE: u64 = 100;

#[derive(Debug)]
struct RangeData {
    name: Symbol,
    lower: Expr,
    upper: Expr,
    size: Expr,
    estimate: u64,
}

/// A symbolic index domain.
///
/// **Equality**: two ranges are equal iff their names match. Bounds and the
/// size estimate do not take part in comparison, ordering or hashing.
#[derive(Clone)]
pub struct Range(Arc<RangeData>);

impl Range {
    /// Create a range with explicit bounds and size expression.
    ///
    /// The numeric size estimate used by the cost model defaults to
    /// [`DEFAULT_SIZE_ESTIMATE`].
    pub fn new(
        name: impl Into<Symbol>,
        lower: impl Into<Expr>,
        upper: impl Into<Expr>,
        size: impl Into<Expr>,
    ) -> Self {
        Self(Arc::new(RangeData {
            name: name.into(),
            lower: lower.into(),
            upper: upper.into(),
            size: size.into(),
            estimate: DEFAULT_SIZE_ESTIMATE,
        }))
    }

    /// Range `[0, n)` whose size expression is `n` itself.
    pub fn zero_to(name: impl Into<Symbol>, n: &str) -> Self {
        Self::new(name, "0", n, n)
    }

    /// Replace the numeric size estimate.
    pub fn with_estimate(self, estimate: u64) -> Self {
        let data = &*self.0;
        Self(Arc::new(RangeData {
            name: data.name.clone(),
            lower: data.lower.clone(),
            upper: data.upper.clone(),
            size: data.size.clone(),
            estimate: estimate.max(1),
        }))
    }

    pub fn name(&self) -> &Symbol {
        &self.0.name
    }

    pub fn lower(&self) -> &Expr {
        &self.0.lower
    }

    pub fn upper(&self) -> &Expr {
        &self.0.upper
    }

    pub fn size(&self) -> &Expr {
        &self.0.size
    }

    /// Numeric size used by the cost model (at least 1).
    pub fn estimate(&self) -> u64 {
        self.0.estimate
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for Range {}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Range {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl Hash for Range {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range({})", self.0.name)
    }
}

/// An index: a dummy symbol drawn from a range.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index {
    pub symbol: Symbol,
    pub range: Range,
}

impl Index {
    pub fn new(symbol: impl Into<Symbol>, range: &Range) -> Self {
        Self {
            symbol: symbol.into(),
            range: range.clone(),
        }
    }

    /// Same range, different symbol.
    pub fn renamed(&self, symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            range: self.range.clone(),
        }
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Make several indices over one range.
pub fn indices(range: &Range, symbols: &[&str]) -> Vec<Index> {
    symbols.iter().map(|s| Index::new(*s, range)).collect()
}
