//! Factorization optimizer for tensor contraction equations.
//!
//! [`optimize`] rewrites a set of equations into an [`EvalSeq`] that
//! computes the same tensors with fewer multiplications:
//!
//! - each term's product is split into a binary contraction tree, found by
//!   branch and bound over leaf subsets with a greedy fallback;
//! - equal subproducts, detected through canonical [`Signature`]s, become a
//!   single intermediate shared by every term and equation using them.
//!
//! [`verify_eval_seq`] checks a result against its input by inlining.
//!
//! [`EvalSeq`]: gristmill_core::EvalSeq

pub mod canon;
pub mod cost;
pub mod error;
pub mod factorize;
pub mod memo;
pub mod network;
pub mod options;
pub mod search;
pub mod verify;

pub use canon::{canonicalize, Canonical, Role, Signature, SlotLabel};
pub use cost::{flop_cost, term_cost, Cost};
pub use error::{OptimizeError, Result, VerifyError};
pub use factorize::{optimize, OptimizeReport, Optimized};
pub use memo::{Definition, SignatureMemo};
pub use options::{OptimizeOptions, Strategy};
pub use verify::{inline_intermediates, verify_eval_seq};
