use crate::{
    automaton::{Pdrta, StateId},
    learner::Frontier,
    math,
    sample::{Symbol, Time},
};

mod comparison;
pub use comparison::Evidence;
use comparison::Comparison;

mod likelihood;
pub use likelihood::LikelihoodRatioTester;

mod fisher;
pub use fisher::FishersMethodTester;

/// Computes how well two parts of a [`Pdrta`] are described by one common distribution.
///
/// Both operations return a p-value. A merge is supported by a high value (the futures of
/// both states cannot be told apart), a split by a low value (the tails on both sides of
/// the cut behave differently). Implementations are pure functions of the tails currently
/// stored in the automaton and the given red/blue partition.
pub trait OperationTester {
    /// Scores merging `blue` into `red`.
    fn score_merge(&self, pdrta: &Pdrta, frontier: &Frontier, red: StateId, blue: StateId)
        -> f64;

    /// Scores cutting the interval of `state` on `symbol` that contains `at` into the parts
    /// up to and including `at` and after `at`.
    fn score_split(
        &self,
        pdrta: &Pdrta,
        frontier: &Frontier,
        state: StateId,
        symbol: Symbol,
        at: Time,
    ) -> f64;
}

/// The available testing strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tester {
    /// Likelihood ratio tests whose statistics are added up, see [`LikelihoodRatioTester`].
    LikelihoodRatio(LikelihoodRatioTester),
    /// Individual p-values combined with Fisher's method, see [`FishersMethodTester`].
    FishersMethod(FishersMethodTester),
}

impl OperationTester for Tester {
    fn score_merge(
        &self,
        pdrta: &Pdrta,
        frontier: &Frontier,
        red: StateId,
        blue: StateId,
    ) -> f64 {
        match self {
            Tester::LikelihoodRatio(t) => t.score_merge(pdrta, frontier, red, blue),
            Tester::FishersMethod(t) => t.score_merge(pdrta, frontier, red, blue),
        }
    }

    fn score_split(
        &self,
        pdrta: &Pdrta,
        frontier: &Frontier,
        state: StateId,
        symbol: Symbol,
        at: Time,
    ) -> f64 {
        match self {
            Tester::LikelihoodRatio(t) => t.score_split(pdrta, frontier, state, symbol, at),
            Tester::FishersMethod(t) => t.score_split(pdrta, frontier, state, symbol, at),
        }
    }
}

impl From<LikelihoodRatioTester> for Tester {
    fn from(value: LikelihoodRatioTester) -> Self {
        Tester::LikelihoodRatio(value)
    }
}

impl From<FishersMethodTester> for Tester {
    fn from(value: FishersMethodTester) -> Self {
        Tester::FishersMethod(value)
    }
}

/// p-value of the sum of all statistics against the sum of all degrees of freedom.
fn summed_p_value(evidence: &[Evidence]) -> f64 {
    let (statistic, degrees) = evidence
        .iter()
        .fold((0.0, 0), |(s, d), e| (s + e.statistic, d + e.degrees));
    math::chi_squared_survival(statistic, degrees)
}
