//! Contraction-tree search for one term.
//!
//! # Algorithm
//!
//! 1. Frontier: every connected leaf subset is canonicalized once; the
//!    signatures feed the shared reuse counts and the canonical forms stay
//!    cached for the search.
//! 2. Greedy: repeatedly fuse the cheapest pair of operands that share an
//!    index (outer products only when nothing is shared). This always
//!    finishes and gives an upper bound.
//! 3. Branch and bound: best tree for every leaf subset, built by subset
//!    size from disjoint pairs of smaller subsets. Partial scores above the
//!    greedy bound are dropped. Connected pairs are tried first; outer
//!    products are admitted only if the full set stays unreachable.
//!
//! The score of a fusion is its cost divided by the reuse count of the
//! fused product, so products shared with other terms look cheaper. Ties
//! go to the lowest `(score, child signatures, child leaf sets)`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use gristmill_core::BitSet;

use crate::canon::{Canonical, Signature};
use crate::cost::Cost;
use crate::network::TermNetwork;
use crate::options::{OptimizeOptions, Strategy};

/// Canonical forms of leaf subsets, keyed by the subset.
pub type CanonCache = HashMap<BitSet, Arc<Canonical>>;

/// Deadline checks happen once per this many evaluations.
const CLOCK_STRIDE: u64 = 256;

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

// ============================================================================
// Trees
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub set: BitSet,
    pub children: Option<(usize, usize)>,
}

/// Binary contraction tree over the leaves of a term.
///
/// Nodes `0..leaf_count` are the leaves, in factor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionTree {
    pub nodes: Vec<TreeNode>,
    pub root: usize,
}

impl ContractionTree {
    fn leaves(n: usize) -> Self {
        Self {
            nodes: (0..n)
                .map(|i| TreeNode {
                    set: BitSet::singleton(i),
                    children: None,
                })
                .collect(),
            root: 0,
        }
    }

    fn push(&mut self, left: usize, right: usize) -> usize {
        let set = self.nodes[left].set.union(&self.nodes[right].set);
        self.nodes.push(TreeNode {
            set,
            children: Some((left, right)),
        });
        self.nodes.len() - 1
    }

    /// Whether the tree fuses anything at all.
    pub fn is_trivial(&self) -> bool {
        self.nodes[self.root].children.is_none()
    }

    /// Nodes with children, children before parents.
    pub fn fusions(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().filter(|n| n.children.is_some())
    }

    /// Undiscounted cost of evaluating every fusion of the tree.
    pub fn cost(&self, net: &TermNetwork<'_>) -> Cost {
        self.fusions()
            .filter_map(|n| n.children)
            .map(|(l, r)| net.fuse_cost(&self.nodes[l].set, &self.nodes[r].set))
            .fold(0, Cost::saturating_add)
    }
}

// ============================================================================
// Frontier
// ============================================================================

/// Connected subproducts of one term.
#[derive(Debug, Default)]
pub struct Frontier {
    pub cache: CanonCache,
    /// Signatures of the connected subsets of two or more leaves.
    pub signatures: Vec<Signature>,
    /// Enumeration stopped at the node budget or the deadline.
    pub truncated: bool,
}

/// Enumerate the connected leaf subsets of `net` level by level.
///
/// Singletons are always cached. The deadline is checked before each level.
pub fn collect_frontier(net: &TermNetwork<'_>, budget: u64, deadline: Option<Instant>) -> Frontier {
    let mut frontier = Frontier::default();
    let n = net.leaf_count();
    let mut level: BTreeSet<BitSet> = (0..n).map(BitSet::singleton).collect();
    for set in &level {
        frontier.cache.insert(set.clone(), Arc::new(net.canonical(set)));
    }

    let mut enumerated = 0u64;
    'levels: for _ in 2..=n {
        if expired(deadline) {
            frontier.truncated = true;
            break;
        }
        let mut next = BTreeSet::new();
        for set in &level {
            for leaf in &net.neighbours(set) {
                let mut grown = set.clone();
                grown.insert(leaf);
                if frontier.cache.contains_key(&grown) {
                    continue;
                }
                enumerated += 1;
                if enumerated > budget {
                    frontier.truncated = true;
                    break 'levels;
                }
                let canon = net.canonical(&grown);
                frontier.signatures.push(canon.signature.clone());
                frontier.cache.insert(grown.clone(), Arc::new(canon));
                next.insert(grown);
            }
        }
        if next.is_empty() {
            break;
        }
        level = next;
    }
    frontier
}

/// Canonical form of `set`, computed at most once per cache.
pub fn cached_canonical(
    cache: &mut CanonCache,
    net: &TermNetwork<'_>,
    set: &BitSet,
) -> Arc<Canonical> {
    if let Some(c) = cache.get(set) {
        return Arc::clone(c);
    }
    let c = Arc::new(net.canonical(set));
    cache.insert(set.clone(), Arc::clone(&c));
    c
}

// ============================================================================
// Search
// ============================================================================

/// Result of searching one term.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub tree: ContractionTree,
    /// Discounted score the search minimized.
    pub score: Cost,
    /// Undiscounted cost of the tree.
    pub cost: Cost,
    /// Candidate fusions evaluated.
    pub nodes: u64,
    /// The budget ran out and the greedy tree was kept.
    pub degraded: bool,
}

struct Search<'n, 'a> {
    net: &'n TermNetwork<'a>,
    cache: &'n mut CanonCache,
    reuse: &'n HashMap<Signature, u32>,
    budget: u64,
    deadline: Option<Instant>,
    nodes: u64,
}

/// Why the branch-and-bound stopped early.
struct Exhausted;

#[derive(Debug, Clone)]
struct Choice {
    score: Cost,
    split: Option<(BitSet, BitSet)>,
}

impl Search<'_, '_> {
    fn canon(&mut self, set: &BitSet) -> Arc<Canonical> {
        cached_canonical(self.cache, self.net, set)
    }

    /// Fusion cost of `a` and `b`, discounted by the reuse of their union.
    fn score(&mut self, a: &BitSet, b: &BitSet) -> Cost {
        let fused = a.union(b);
        let sig = self.canon(&fused);
        let reuse = self.reuse.get(&sig.signature).copied().unwrap_or(1).max(1);
        self.net.fuse_cost(a, b) / Cost::from(reuse)
    }

    /// Order a pair by leaf set.
    fn oriented<'s>(a: &'s BitSet, b: &'s BitSet) -> (&'s BitSet, &'s BitSet) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Whether `(score, a, b)` beats `(best_score, best_a, best_b)`.
    fn better(
        &mut self,
        score: Cost,
        pair: (&BitSet, &BitSet),
        best_score: Cost,
        best: (&BitSet, &BitSet),
    ) -> bool {
        if score != best_score {
            return score < best_score;
        }
        let key = (self.canon(pair.0), self.canon(pair.1));
        let best_key = (self.canon(best.0), self.canon(best.1));
        (&key.0.signature, &key.1.signature, pair.0, pair.1)
            < (&best_key.0.signature, &best_key.1.signature, best.0, best.1)
    }

    fn tick(&mut self) -> Result<(), Exhausted> {
        self.nodes += 1;
        if self.nodes > self.budget {
            return Err(Exhausted);
        }
        if self.nodes % CLOCK_STRIDE == 0 && expired(self.deadline) {
            return Err(Exhausted);
        }
        Ok(())
    }

    fn greedy(&mut self) -> (ContractionTree, Cost) {
        let n = self.net.leaf_count();
        let mut tree = ContractionTree::leaves(n);
        let mut active: Vec<usize> = (0..n).collect();
        let mut total: Cost = 0;

        while active.len() > 1 {
            let mut best: Option<(Cost, usize, usize)> = None;
            for connected_only in [true, false] {
                for (p, &i) in active.iter().enumerate() {
                    for &j in &active[p + 1..] {
                        let (a, b) = (tree.nodes[i].set.clone(), tree.nodes[j].set.clone());
                        if connected_only && !self.net.connected(&a, &b) {
                            continue;
                        }
                        let score = self.score(&a, &b);
                        let (i, j) = if a <= b { (i, j) } else { (j, i) };
                        let wins = match best {
                            None => true,
                            Some((s, bi, bj)) => {
                                let ba = tree.nodes[bi].set.clone();
                                let bb = tree.nodes[bj].set.clone();
                                let pair = Self::oriented(&a, &b);
                                self.better(score, pair, s, (&ba, &bb))
                            }
                        };
                        if wins {
                            best = Some((score, i, j));
                        }
                    }
                }
                if best.is_some() {
                    break;
                }
            }
            let Some((score, i, j)) = best else {
                break;
            };
            total = total.saturating_add(score);
            let id = tree.push(i, j);
            active.retain(|&k| k != i && k != j);
            active.push(id);
        }
        tree.root = active.first().copied().unwrap_or(0);
        (tree, total)
    }

    fn branch_and_bound(
        &mut self,
        bound: Cost,
    ) -> Result<Option<(ContractionTree, Cost)>, Exhausted> {
        if expired(self.deadline) {
            return Err(Exhausted);
        }
        let n = self.net.leaf_count();
        let full = self.net.all().clone();
        let mut best: HashMap<BitSet, Choice> = HashMap::new();
        let mut levels: Vec<Vec<BitSet>> = vec![Vec::new(); n + 1];
        for leaf in 0..n {
            let set = BitSet::singleton(leaf);
            best.insert(
                set.clone(),
                Choice {
                    score: 0,
                    split: None,
                },
            );
            levels[1].push(set);
        }

        for allow_outer in [false, true] {
            for m in 2..=n {
                let mut found: BTreeSet<BitSet> = levels[m].iter().cloned().collect();
                for k in 1..=m / 2 {
                    let (small, large) = (levels[k].clone(), levels[m - k].clone());
                    for (ai, a) in small.iter().enumerate() {
                        let skip = if k == m - k { ai + 1 } else { 0 };
                        for b in large.iter().skip(skip) {
                            if !a.is_disjoint(b) || (!allow_outer && !self.net.connected(a, b)) {
                                continue;
                            }
                            self.tick()?;
                            let partial = best[a].score.saturating_add(best[b].score);
                            if partial > bound {
                                continue;
                            }
                            let score = partial.saturating_add(self.score(a, b));
                            if score > bound {
                                continue;
                            }
                            let fused = a.union(b);
                            let (x, y) = Self::oriented(a, b);
                            let wins = match best.get(&fused) {
                                None => true,
                                Some(Choice {
                                    score: s,
                                    split: Some((bx, by)),
                                }) => {
                                    let (s, bx, by) = (*s, bx.clone(), by.clone());
                                    self.better(score, (x, y), s, (&bx, &by))
                                }
                                Some(_) => false,
                            };
                            if wins {
                                best.insert(
                                    fused.clone(),
                                    Choice {
                                        score,
                                        split: Some((x.clone(), y.clone())),
                                    },
                                );
                            }
                            found.insert(fused);
                        }
                    }
                }
                levels[m] = found.into_iter().collect();
            }
            if best.contains_key(&full) {
                break;
            }
        }

        let Some(root) = best.get(&full).cloned() else {
            return Ok(None);
        };
        let mut tree = ContractionTree::leaves(n);
        tree.root = build(&mut tree, &best, &full);
        Ok(Some((tree, root.score)))
    }
}

fn build(tree: &mut ContractionTree, best: &HashMap<BitSet, Choice>, set: &BitSet) -> usize {
    match best.get(set).and_then(|c| c.split.clone()) {
        Some((a, b)) => {
            let l = build(tree, best, &a);
            let r = build(tree, best, &b);
            tree.push(l, r)
        }
        None => set.first().unwrap_or(0),
    }
}

/// Search the contraction tree of one term.
pub fn search_term(
    net: &TermNetwork<'_>,
    cache: &mut CanonCache,
    reuse: &HashMap<Signature, u32>,
    options: &OptimizeOptions,
    deadline: Option<Instant>,
) -> SearchOutcome {
    let mut search = Search {
        net,
        cache,
        reuse,
        budget: options.node_budget,
        deadline,
        nodes: 0,
    };
    let (greedy, greedy_score) = search.greedy();
    let mut outcome = SearchOutcome {
        cost: greedy.cost(net),
        tree: greedy,
        score: greedy_score,
        nodes: 0,
        degraded: false,
    };

    if options.strategy == Strategy::Optimal && net.leaf_count() > 2 {
        match search.branch_and_bound(greedy_score) {
            Ok(Some((tree, score))) => {
                outcome.cost = tree.cost(net);
                outcome.tree = tree;
                outcome.score = score;
            }
            Ok(None) => {}
            Err(Exhausted) => outcome.degraded = true,
        }
    }
    outcome.nodes = search.nodes;
    outcome
}
