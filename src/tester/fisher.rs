use tracing::trace;

use super::{Comparison, Evidence, OperationTester};
use crate::{
    automaton::{Pdrta, StateId},
    learner::Frontier,
    math,
    sample::{Symbol, Time},
};

/// Tester that turns every comparison into its own p-value and combines them with Fisher's
/// method: `-2 Σ ln p` is chi-squared distributed with `2k` degrees of freedom for `k`
/// independent tests. Comparisons are pooled and recursive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FishersMethodTester;

impl FishersMethodTester {
    fn comparison<'a>(&self, pdrta: &'a Pdrta, frontier: &'a Frontier) -> Comparison<'a> {
        Comparison {
            pdrta,
            frontier,
            pooled: true,
            recursive: true,
        }
    }
}

/// Combines the p-values of all informative comparisons.
fn combined_p_value(evidence: &[Evidence]) -> f64 {
    let (statistic, tests) = evidence
        .iter()
        .filter(|e| e.is_informative())
        .map(|e| math::chi_squared_survival(e.statistic, e.degrees))
        .fold((0.0, 0), |(s, k), p| (s - 2.0 * p.max(f64::MIN_POSITIVE).ln(), k + 1));
    math::chi_squared_survival(statistic, 2 * tests)
}

impl OperationTester for FishersMethodTester {
    fn score_merge(
        &self,
        pdrta: &Pdrta,
        frontier: &Frontier,
        red: StateId,
        blue: StateId,
    ) -> f64 {
        let score = combined_p_value(&self.comparison(pdrta, frontier).merge(red, blue));
        trace!("fisher's method for merging {blue} into {red}: {score}");
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
        let score =
            combined_p_value(&self.comparison(pdrta, frontier).split(state, symbol, at));
        trace!("fisher's method for splitting {state} on {symbol} at {at}: {score}");
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tester::tests::{diverging_sample, geometric_sample};

    #[test]
    fn combination() {
        assert_eq!(combined_p_value(&[]), 1.0);
        assert_eq!(combined_p_value(&[Evidence::NONE]), 1.0);
        // a single test keeps its p-value
        let single = Evidence {
            statistic: 3.84,
            degrees: 1,
        };
        let p = math::chi_squared_survival(3.84, 1);
        assert!(math::almost_equal(combined_p_value(&[single]), p, 1e-6));
        // two borderline tests make for stronger evidence than one
        assert!(combined_p_value(&[single, single]) < p);
    }

    #[test_log::test]
    fn scores() {
        let tester = FishersMethodTester;
        let pdrta = diverging_sample(20);
        let frontier = Frontier::new(&pdrta);
        assert!(tester.score_split(&pdrta, &frontier, pdrta.root(), 0, 4) < 0.001);

        let pdrta = geometric_sample();
        let frontier = Frontier::new(&pdrta);
        let child = pdrta.successor(pdrta.root(), 0, 1).unwrap();
        assert!(tester.score_merge(&pdrta, &frontier, pdrta.root(), child) > 0.05);
    }
}
