use std::{
    cmp::{Ordering, Reverse},
    fmt::Display,
};

use owo_colors::OwoColorize;

use crate::{
    automaton::{Pdrta, PdrtaError, StateId},
    sample::{Symbol, Time},
};

/// A change to the automaton that the learner considers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Merge `blue` into `red`.
    Merge {
        /// The state that is kept.
        red: StateId,
        /// The state that is merged away.
        blue: StateId,
    },
    /// Cut the interval of `state` on `symbol` after `at`.
    Split {
        /// The state whose interval is cut.
        state: StateId,
        /// The symbol of the interval.
        symbol: Symbol,
        /// Last delay of the lower part.
        at: Time,
    },
}

/// A scored [`Operation`]. Refinements are totally ordered: a higher score is better, among
/// equal scores a merge into a lower red state and a split at an earlier delay win.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Refinement {
    /// What to do.
    pub operation: Operation,
    /// How desirable it is, in `[0, 1]`.
    pub score: f64,
}

impl Refinement {
    /// Scores a merge with the p-value `p`. Returns `None` unless the p-value exceeds the
    /// significance level, in which case the score is rescaled to `(p - s) / (1 - s)`.
    pub fn merge(red: StateId, blue: StateId, p: f64, significance: f64) -> Option<Self> {
        (p > significance && p <= 1.0).then(|| Self {
            operation: Operation::Merge { red, blue },
            score: (p - significance) / (1.0 - significance),
        })
    }

    /// Scores a split with the p-value `p`. Returns `None` unless the p-value is below the
    /// significance level, in which case the score is rescaled to `(s - p) / s`.
    pub fn split(
        state: StateId,
        symbol: Symbol,
        at: Time,
        p: f64,
        significance: f64,
    ) -> Option<Self> {
        (p < significance && p >= 0.0).then(|| Self {
            operation: Operation::Split { state, symbol, at },
            score: (significance - p) / significance,
        })
    }

    /// Performs the operation on `pdrta`.
    pub fn apply(&self, pdrta: &mut Pdrta) -> Result<(), PdrtaError> {
        match self.operation {
            Operation::Merge { red, blue } => pdrta.merge(red, blue),
            Operation::Split { state, symbol, at } => pdrta.split(state, symbol, at).map(|_| ()),
        }
    }

    fn tie_break(&self) -> (u8, Reverse<(StateId, StateId, Time)>) {
        match self.operation {
            Operation::Merge { red, blue } => (0, Reverse((red, blue, 0))),
            Operation::Split { state, symbol, at } => (1, Reverse((state, symbol, at))),
        }
    }
}

impl Eq for Refinement {}

impl PartialOrd for Refinement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Refinement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.tie_break().cmp(&other.tie_break()))
    }
}

impl Display for Refinement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operation {
            Operation::Merge { red, blue } => write!(
                f,
                "{} {blue} into {red} ({:.4})",
                "merge".blue().bold(),
                self.score
            ),
            Operation::Split { state, symbol, at } => write!(
                f,
                "{} {state} on {symbol} after {at} ({:.4})",
                "split".red().bold(),
                self.score
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::almost_equal;

    #[test]
    fn rescaling() {
        let merge = Refinement::merge(0, 3, 0.10, 0.05).unwrap();
        assert!(almost_equal(merge.score, 0.05 / 0.95, 1e-9));
        assert!((merge.score - 0.0526).abs() < 1e-4);
        assert!(Refinement::merge(0, 3, 0.03, 0.05).is_none());
        assert!(Refinement::merge(0, 3, 0.05, 0.05).is_none());

        let split = Refinement::split(0, 0, 7, 0.01, 0.05).unwrap();
        assert!(almost_equal(split.score, 0.8, 1e-9));
        assert!(Refinement::split(0, 0, 7, 0.10, 0.05).is_none());
        assert!(Refinement::split(0, 0, 7, 0.0, 0.0).is_none());
        assert!(Refinement::merge(0, 1, 1.0, 1.0).is_none());
    }

    #[test]
    fn ordering() {
        let low = Refinement::merge(2, 5, 0.5, 0.05).unwrap();
        let high = Refinement::merge(4, 5, 0.9, 0.05).unwrap();
        assert!(high > low);
        let tied = Refinement::merge(1, 5, 0.5, 0.05).unwrap();
        assert_eq!([low, tied, high].into_iter().max(), Some(high));
        assert_eq!([low, tied].into_iter().max(), Some(tied));

        let early = Refinement::split(0, 1, 3, 0.01, 0.05).unwrap();
        let late = Refinement::split(0, 1, 8, 0.01, 0.05).unwrap();
        assert_eq!([late, early].into_iter().max(), Some(early));
    }
}
