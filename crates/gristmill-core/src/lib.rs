//! Tensor-equation IR shared by the gristmill crates.
//!
//! An equation set is a list of [`Computation`]s: each defines a named
//! tensor, indexed by its free [`Index`]es, as a sum of [`Term`]s. A term
//! is a signed, scaled product of [`Factor`]s summed over dummy indices.
//! Symbolic payloads (coefficients, bounds, scalar factors) stay opaque
//! [`Expr`] values.

// Names and opaque payloads
pub mod symbol;
pub use symbol::{Expr, Symbol};

// Index domains
pub mod range;
pub use range::{indices, Index, Range, DEFAULT_SIZE_ESTIMATE};

// Factors, terms and computations
pub mod term;
pub use term::{Computation, Factor, Phase, Term};

// Evaluation sequences
pub mod seq;
pub use seq::EvalSeq;

// Word-parallel sets used by the optimizer
pub mod bitset;
pub use bitset::BitSet;

// Input checks
pub mod error;
pub mod validate;
pub use error::{IrError, Result};
pub use validate::{validate, validate_with, Declarations};
