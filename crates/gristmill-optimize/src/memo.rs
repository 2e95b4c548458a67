//! Shared table of product signatures.
//!
//! During frontier collection every term reports the signatures of its
//! connected subproducts; the number of distinct terms that reported a
//! signature is its reuse count. During materialization the same table maps
//! a signature to the computation that first defined it, so every later
//! occurrence references that definition instead of recomputing it.

use std::collections::{HashMap, HashSet};

use gristmill_core::{Factor, Index, Symbol};
use parking_lot::Mutex;

use crate::canon::Signature;

/// A computation holding the value of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub base: Symbol,
    /// For every free index of the definition, the canonical slot that
    /// feeds it.
    pub slots: Vec<usize>,
}

impl Definition {
    /// A definition whose free indices are the canonical externals in order.
    pub fn canonical(base: Symbol, rank: usize) -> Self {
        Self {
            base,
            slots: (0..rank).collect(),
        }
    }

    /// Factor referencing this definition from an occurrence whose
    /// canonical externals are `externals`.
    pub fn reference(&self, externals: &[Index]) -> Factor {
        let indices = self.slots.iter().map(|&k| externals[k].clone()).collect();
        Factor::new(self.base.clone(), indices)
    }
}

#[derive(Debug, Default)]
struct Entry {
    terms: u32,
    definition: Option<Definition>,
}

/// Insert-or-find table keyed by [`Signature`], safe to share across the
/// rayon pool.
#[derive(Debug, Default)]
pub struct SignatureMemo {
    entries: Mutex<HashMap<Signature, Entry>>,
}

impl SignatureMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the signatures found in one term. Repeats within the batch
    /// count once.
    pub fn record_term<'a>(&self, signatures: impl IntoIterator<Item = &'a Signature>) {
        let unique: HashSet<&Signature> = signatures.into_iter().collect();
        let mut entries = self.entries.lock();
        for sig in unique {
            match entries.get_mut(sig) {
                Some(entry) => entry.terms += 1,
                None => {
                    entries.insert(
                        sig.clone(),
                        Entry {
                            terms: 1,
                            definition: None,
                        },
                    );
                }
            }
        }
    }

    /// Snapshot of all reuse counts, for lock-free reads during search.
    pub fn reuse_table(&self) -> HashMap<Signature, u32> {
        self.entries
            .lock()
            .iter()
            .map(|(sig, entry)| (sig.clone(), entry.terms))
            .collect()
    }

    pub fn lookup(&self, sig: &Signature) -> Option<Definition> {
        self.entries
            .lock()
            .get(sig)
            .and_then(|entry| entry.definition.clone())
    }

    /// Register `definition` for `sig` unless one exists; returns the
    /// definition that is in effect afterwards.
    pub fn define(&self, sig: &Signature, definition: Definition) -> Definition {
        let mut entries = self.entries.lock();
        let entry = entries.entry(sig.clone()).or_default();
        entry.definition.get_or_insert(definition).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
