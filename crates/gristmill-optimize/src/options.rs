//! Optimizer configuration.

use std::time::Duration;

/// Contraction-tree search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Repeatedly fuse the locally cheapest pair.
    Greedy,
    /// Greedy for an upper bound, then exhaustive branch-and-bound over
    /// leaf subsets within the node budget.
    #[default]
    Optimal,
}

/// Options for [`crate::optimize`].
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Tree search strategy.
    pub strategy: Strategy,
    /// Share equal subproducts across terms and equations.
    /// When off, every term is factorized on its own.
    pub share_intermediates: bool,
    /// Candidate fusions evaluated per term before the search gives up and
    /// keeps the greedy tree.
    pub node_budget: u64,
    /// Wall-clock limit for the whole search phase.
    /// If `None`, only the node budget applies.
    pub time_budget: Option<Duration>,
    /// A term is split into a chain of intermediates when its tree cost is
    /// below `flat_threshold` times the cost of evaluating it flat.
    pub flat_threshold: f64,
    /// Name pattern for new intermediates; `{}` is replaced by a counter.
    pub interm_format: String,
    /// Run frontier collection and tree search on the rayon pool.
    pub parallel: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Optimal,
            share_intermediates: true,
            node_budget: 1_000_000,
            time_budget: None,
            flat_threshold: 1.0,
            interm_format: "tau{}".to_string(),
            parallel: false,
        }
    }
}

impl OptimizeOptions {
    /// Options for greedy search only.
    pub fn greedy() -> Self {
        Self {
            strategy: Strategy::Greedy,
            ..Default::default()
        }
    }

    /// Options for branch-and-bound search.
    pub fn optimal() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_share_intermediates(mut self, share: bool) -> Self {
        self.share_intermediates = share;
        self
    }

    pub fn with_node_budget(mut self, budget: u64) -> Self {
        self.node_budget = budget;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_flat_threshold(mut self, threshold: f64) -> Self {
        self.flat_threshold = threshold;
        self
    }

    pub fn with_interm_format(mut self, format: impl Into<String>) -> Self {
        self.interm_format = format.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let opts = OptimizeOptions::greedy()
            .with_node_budget(10)
            .with_interm_format("t_{}")
            .with_parallel(true);
        assert_eq!(opts.strategy, Strategy::Greedy);
        assert_eq!(opts.node_budget, 10);
        assert_eq!(opts.interm_format, "t_{}");
        assert!(opts.parallel);
        assert!(opts.share_intermediates);
        assert_eq!(OptimizeOptions::optimal().strategy, Strategy::Optimal);
    }
}
