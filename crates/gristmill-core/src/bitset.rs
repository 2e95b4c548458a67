//! Variable-width bit sets.
//!
//! The optimizer describes every candidate intermediate by the set of leaf
//! factors it covers and the set of indices it touches. Containment,
//! overlap and union queries on those sets dominate the search, so they are
//! word-parallel here: every binary operation is O(number of words).
//!
//! The representation is normalized (no trailing zero words), which makes
//! derived equality and hashing structural regardless of how a set was
//! built. Ordering is the numeric value of the bit vector.

use std::cmp::Ordering;
use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The set `{bit}`.
    pub fn singleton(bit: usize) -> Self {
        let mut set = Self::new();
        set.insert(bit);
        set
    }

    /// Add `bit`; returns whether it was absent.
    pub fn insert(&mut self, bit: usize) -> bool {
        let (w, b) = (bit / WORD_BITS, bit % WORD_BITS);
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        let mask = 1u64 << b;
        let absent = self.words[w] & mask == 0;
        self.words[w] |= mask;
        absent
    }

    /// Remove `bit`; returns whether it was present.
    pub fn remove(&mut self, bit: usize) -> bool {
        let (w, b) = (bit / WORD_BITS, bit % WORD_BITS);
        let Some(word) = self.words.get_mut(w) else {
            return false;
        };
        let mask = 1u64 << b;
        let present = *word & mask != 0;
        *word &= !mask;
        self.trim();
        present
    }

    pub fn contains(&self, bit: usize) -> bool {
        let (w, b) = (bit / WORD_BITS, bit % WORD_BITS);
        self.words.get(w).is_some_and(|word| word & (1u64 << b) != 0)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn union(&self, other: &BitSet) -> BitSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    pub fn intersection(&self, other: &BitSet) -> BitSet {
        let mut out = BitSet {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        };
        out.trim();
        out
    }

    /// Members of `self` not in `other`.
    pub fn difference(&self, other: &BitSet) -> BitSet {
        let mut out = self.clone();
        for (a, b) in out.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
        out.trim();
        out
    }

    /// Whether every member of `self` is in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        if self.words.len() > other.words.len() {
            return false;
        }
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    pub fn is_disjoint(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & b == 0)
    }

    pub fn intersects(&self, other: &BitSet) -> bool {
        !self.is_disjoint(other)
    }

    /// Smallest member.
    pub fn first(&self) -> Option<usize> {
        self.iter().next()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl Ord for BitSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.words
            .len()
            .cmp(&other.words.len())
            .then_with(|| self.words.iter().rev().cmp(other.words.iter().rev()))
    }
}

impl PartialOrd for BitSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        for bit in iter {
            set.insert(bit);
        }
        set
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Ones<'a>;

    fn into_iter(self) -> Ones<'a> {
        self.iter()
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Ascending iterator over the members of a [`BitSet`].
pub struct Ones<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * WORD_BITS + bit);
            }
            self.word_idx += 1;
            self.current = *self.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::{BTreeSet, HashSet};

    fn set(bits: &[usize]) -> BitSet {
        bits.iter().copied().collect()
    }

    #[test]
    fn test_insert_remove_contains() {
        let mut s = BitSet::new();
        assert!(s.is_empty());
        assert!(s.insert(3));
        assert!(!s.insert(3));
        assert!(s.insert(130));
        assert!(s.contains(3) && s.contains(130));
        assert!(!s.contains(64));
        assert_eq!(s.len(), 2);
        assert!(s.remove(130));
        assert!(!s.remove(130));
        assert!(!s.remove(1000));
        assert_eq!(s, set(&[3]));
    }

    #[test]
    fn test_normalized_equality_and_hash() {
        let mut a = set(&[1, 200]);
        a.remove(200);
        let b = set(&[1]);
        assert_eq!(a, b);
        let mut hs = HashSet::new();
        hs.insert(a);
        assert!(hs.contains(&b));

        let mut c = set(&[70]);
        c.remove(70);
        assert!(c.is_empty());
        assert_eq!(c, BitSet::new());
    }

    #[test]
    fn test_set_algebra_across_words() {
        let a = set(&[0, 5, 64, 129]);
        let b = set(&[5, 64, 300]);
        assert_eq!(a.union(&b), set(&[0, 5, 64, 129, 300]));
        assert_eq!(a.intersection(&b), set(&[5, 64]));
        assert_eq!(a.difference(&b), set(&[0, 129]));
        assert_eq!(b.difference(&a), set(&[300]));
        assert!(set(&[5, 64]).is_subset(&a));
        assert!(!b.is_subset(&a));
        assert!(BitSet::new().is_subset(&a));
        assert!(a.intersects(&b));
        assert!(set(&[1, 2]).is_disjoint(&set(&[3, 400])));
    }

    #[test]
    fn test_intersection_trims() {
        let a = set(&[1, 100]);
        let b = set(&[2, 100 + 64]);
        let i = a.intersection(&b);
        assert!(i.is_empty());
        assert_eq!(i, BitSet::new());
    }

    #[test]
    fn test_iter_ascending() {
        let s = set(&[190, 3, 64, 63, 0]);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 3, 63, 64, 190]);
        assert_eq!(s.first(), Some(0));
        assert_eq!(BitSet::new().first(), None);
        assert_eq!(format!("{:?}", set(&[2, 1])), "{1, 2}");
    }

    #[test]
    fn test_order_is_numeric() {
        assert!(set(&[0]) < set(&[1]));
        assert!(set(&[0, 1]) < set(&[2]));
        assert!(set(&[63]) < set(&[64]));
        assert!(BitSet::new() < set(&[0]));
        let mut v = vec![set(&[64]), set(&[1, 2]), set(&[3])];
        v.sort();
        assert_eq!(v, vec![set(&[1, 2]), set(&[3]), set(&[64])]);
    }

    #[test]
    fn test_matches_btreeset_model() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let xs: BTreeSet<usize> = (0..rng.random_range(0..20))
                .map(|_| rng.random_range(0..200))
                .collect();
            let ys: BTreeSet<usize> = (0..rng.random_range(0..20))
                .map(|_| rng.random_range(0..200))
                .collect();
            let a: BitSet = xs.iter().copied().collect();
            let b: BitSet = ys.iter().copied().collect();

            let union: Vec<usize> = xs.union(&ys).copied().collect();
            let inter: Vec<usize> = xs.intersection(&ys).copied().collect();
            let diff: Vec<usize> = xs.difference(&ys).copied().collect();
            assert_eq!(a.union(&b).iter().collect::<Vec<_>>(), union);
            assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), inter);
            assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), diff);
            assert_eq!(a.is_subset(&b), xs.is_subset(&ys));
            assert_eq!(a.is_disjoint(&b), xs.is_disjoint(&ys));
            assert_eq!(a.len(), xs.len());
        }
    }
}
