//! Names and opaque symbolic payloads.
//!
//! The algebra layer that produces equations owns the real symbolic
//! expressions. The compiler only needs their rendered text and, for
//! scalar factors, the index symbols they mention.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// A name: tensor base, index dummy or range label.
///
/// Cheap to clone. Compares, orders and hashes by its text.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a symbol from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Opaque symbolic expression.
///
/// Carries the rendered text the printers need and the index symbols the
/// expression depends on. An "other factor" such as `c**2` inside a sum
/// over `c` must declare `c` here, otherwise the optimizer is free to sum
/// `c` away inside an intermediate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    text: Arc<str>,
    deps: Vec<Symbol>,
}

impl Expr {
    /// An expression with no index dependence.
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            text: Arc::from(text.as_ref()),
            deps: Vec::new(),
        }
    }

    /// An expression depending on the given index symbols.
    pub fn with_deps<I, S>(text: impl AsRef<str>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let mut deps: Vec<Symbol> = deps.into_iter().map(Into::into).collect();
        deps.sort();
        deps.dedup();
        Self {
            text: Arc::from(text.as_ref()),
            deps,
        }
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self::new("1")
    }

    /// Whether this is the literal identity `1`.
    pub fn is_one(&self) -> bool {
        &*self.text == "1"
    }

    /// Rendered text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Index symbols the expression depends on, sorted and unique.
    pub fn deps(&self) -> &[Symbol] {
        &self.deps
    }

    /// Whether the expression mentions the given index symbol.
    pub fn depends_on(&self, symbol: &Symbol) -> bool {
        self.deps.binary_search(symbol).is_ok()
    }

    /// Product of two expressions, keeping the text readable when either
    /// side is the identity.
    pub fn mul(&self, other: &Expr) -> Expr {
        if self.is_one() {
            return other.clone();
        }
        if other.is_one() {
            return self.clone();
        }
        let text = format!("({})*({})", self.text, other.text);
        Expr::with_deps(text, self.deps.iter().chain(&other.deps).cloned())
    }

    /// Rename index dependencies through `rename`; the text is unchanged.
    ///
    /// Only used when inlining definitions, where dummy renaming never has
    /// to be visible in rendered output.
    pub fn map_deps(&self, mut rename: impl FnMut(&Symbol) -> Symbol) -> Expr {
        Expr::with_deps(&*self.text, self.deps.iter().map(&mut rename))
    }
}

impl Default for Expr {
    fn default() -> Self {
        Self::one()
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deps.is_empty() {
            write!(f, "{:?}", &*self.text)
        } else {
            write!(f, "{:?}{:?}", &*self.text, self.deps)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_orders_by_name() {
        let mut syms = vec![Symbol::new("c"), Symbol::new("a"), Symbol::new("b")];
        syms.sort();
        let names: Vec<&str> = syms.iter().map(Symbol::as_str).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(Symbol::from("a"), Symbol::from(String::from("a")));
    }

    #[test]
    fn test_expr_deps_sorted_unique() {
        let e = Expr::with_deps("c**2*b", ["c", "b", "c"]);
        assert_eq!(e.deps(), &[Symbol::new("b"), Symbol::new("c")]);
        assert!(e.depends_on(&Symbol::new("c")));
        assert!(!e.depends_on(&Symbol::new("a")));
    }

    #[test]
    fn test_expr_mul_identity() {
        let r = Expr::new("2*r");
        assert_eq!(Expr::one().mul(&r), r);
        assert_eq!(r.mul(&Expr::one()), r);
        assert_eq!(r.mul(&Expr::new("s")).text(), "(2*r)*(s)");
        assert!(Expr::default().is_one());
    }
}
