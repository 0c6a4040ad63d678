use tracing::trace;

use super::{summed_p_value, Comparison, OperationTester};
use crate::{
    automaton::{Pdrta, StateId},
    learner::Frontier,
    sample::{Symbol, Time},
};

/// Likelihood ratio tester. All comparisons made for one operation are summed into a single
/// statistic whose p-value is the score.
///
/// The naive variant compares the raw counts of every pair of tail sets it encounters. The
/// pooled variant pools sparse cells, skips tail sets with too little data and, when
/// scoring merges, represents red states by all of their tails. Whether the comparison
/// continues below the first pair of tail sets is controlled by `recursive`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LikelihoodRatioTester {
    pooled: bool,
    recursive: bool,
}

impl LikelihoodRatioTester {
    /// The pooled tester, comparing all reachable pairs if `recursive` is set and only
    /// the immediate futures otherwise.
    pub fn new(recursive: bool) -> Self {
        Self {
            pooled: true,
            recursive,
        }
    }

    /// The naive tester, which always recurses and never pools.
    pub fn naive() -> Self {
        Self {
            pooled: false,
            recursive: true,
        }
    }

    /// Returns true if the comparison recurses into successor states.
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Returns true if sparse cells are pooled.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    fn comparison<'a>(&self, pdrta: &'a Pdrta, frontier: &'a Frontier) -> Comparison<'a> {
        Comparison {
            pdrta,
            frontier,
            pooled: self.pooled,
            recursive: self.recursive,
        }
    }
}

impl Default for LikelihoodRatioTester {
    fn default() -> Self {
        Self::new(false)
    }
}

impl OperationTester for LikelihoodRatioTester {
    fn score_merge(
        &self,
        pdrta: &Pdrta,
        frontier: &Frontier,
        red: StateId,
        blue: StateId,
    ) -> f64 {
        let evidence = self.comparison(pdrta, frontier).merge(red, blue);
        let score = summed_p_value(&evidence);
        trace!("likelihood ratio for merging {blue} into {red}: {score}");
        score
    }

    fn score_split(
        &self,
        pdrta: &Pdrta,
        frontier: &Frontier,
        state: StateId,
        symbol: Symbol,
        at: Time,
    ) -> f64 {
        let evidence = self.comparison(pdrta, frontier).split(state, symbol, at);
        let score = summed_p_value(&evidence);
        trace!("likelihood ratio for splitting {state} on {symbol} at {at}: {score}");
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tester::tests::{diverging_sample, geometric_sample};

    #[test_log::test]
    fn split_detects_diverging_futures() {
        let pdrta = diverging_sample(20);
        let frontier = Frontier::new(&pdrta);
        let root = pdrta.root();
        for tester in [
            LikelihoodRatioTester::naive(),
            LikelihoodRatioTester::new(true),
            LikelihoodRatioTester::new(false),
        ] {
            assert!(tester.score_split(&pdrta, &frontier, root, 0, 4) < 0.001);
            // cutting outside of the occupied range leaves one side empty
            assert_eq!(tester.score_split(&pdrta, &frontier, root, 0, 0), 1.0);
            // the upper bound of an interval is no cut at all
            assert_eq!(tester.score_split(&pdrta, &frontier, root, 0, 9), 1.0);
        }
    }

    #[test_log::test]
    fn merge_of_similar_states() {
        let pdrta = geometric_sample();
        let frontier = Frontier::new(&pdrta);
        let root = pdrta.root();
        let child = pdrta.successor(root, 0, 1).unwrap();
        let tester = LikelihoodRatioTester::new(true);
        let score = tester.score_merge(&pdrta, &frontier, root, child);
        assert!(score > 0.05, "score {score}");
        // nothing can be compared against a state that does not exist
        assert_eq!(tester.score_merge(&pdrta, &frontier, root, 1000), 1.0);
    }

    #[test]
    fn merge_of_different_states() {
        let pdrta = diverging_sample(20);
        let frontier = Frontier::new(&pdrta);
        let root = pdrta.root();
        // the successor of the root reads `a` with delay 1 or `b`; the root only reads `a`
        let child = pdrta.successor(root, 0, 1).unwrap();
        let score = LikelihoodRatioTester::new(false).score_merge(&pdrta, &frontier, root, child);
        assert!(score < 0.05, "score {score}");
    }
}
