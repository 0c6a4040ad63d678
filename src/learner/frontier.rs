use std::{cmp::Reverse, collections::BTreeSet};

use crate::{
    automaton::{Pdrta, StateId},
    sample::{Symbol, Time},
};

/// The red/blue coloring of the search. Red states are final, blue states are targets of
/// transitions leaving red states that are not red themselves. All other states are
/// uncolored.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Frontier {
    red: BTreeSet<StateId>,
    blue: BTreeSet<StateId>,
}

impl Frontier {
    /// The initial coloring, where only the root is red.
    pub fn new(pdrta: &Pdrta) -> Self {
        let mut frontier = Self {
            red: BTreeSet::from([pdrta.root()]),
            blue: BTreeSet::new(),
        };
        frontier.refresh(pdrta);
        frontier
    }

    /// Returns true if `state` is red.
    pub fn is_red(&self, state: StateId) -> bool {
        self.red.contains(&state)
    }

    /// Returns true if `state` is blue.
    pub fn is_blue(&self, state: StateId) -> bool {
        self.blue.contains(&state)
    }

    /// The red states in ascending order.
    pub fn red(&self) -> impl DoubleEndedIterator<Item = StateId> + '_ {
        self.red.iter().copied()
    }

    /// The blue states in ascending order.
    pub fn blue(&self) -> impl DoubleEndedIterator<Item = StateId> + '_ {
        self.blue.iter().copied()
    }

    /// Returns true if there is no blue state left.
    pub fn is_settled(&self) -> bool {
        self.blue.is_empty()
    }

    /// Colors `state` red and its successors blue.
    pub(crate) fn promote(&mut self, pdrta: &Pdrta, state: StateId) {
        self.red.insert(state);
        self.refresh(pdrta);
    }

    /// Recomputes the blue states after the automaton has changed. Red states that no longer
    /// exist are dropped.
    pub(crate) fn refresh(&mut self, pdrta: &Pdrta) {
        self.red.retain(|s| pdrta.contains_state(*s));
        self.blue = self
            .red
            .iter()
            .filter_map(|s| pdrta.state(*s))
            .flat_map(|s| s.successors())
            .filter(|s| !self.red.contains(s))
            .collect();
    }
}

/// A transition from a red into a blue state, as selected for the next iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// The red source state.
    pub source: StateId,
    /// The symbol read.
    pub symbol: Symbol,
    /// Lower bound of the interval.
    pub begin: Time,
    /// Upper bound of the interval.
    pub end: Time,
    /// The blue target state.
    pub target: StateId,
    /// Number of tails taking the transition.
    pub tails: usize,
}

impl Candidate {
    /// Key under which candidates are compared, the largest is selected: the most tails, then
    /// the higher source, the higher target, the higher symbol and the earlier interval.
    pub fn priority(&self) -> (usize, StateId, StateId, Symbol, Reverse<Time>) {
        (
            self.tails,
            self.source,
            self.target,
            self.symbol,
            Reverse(self.begin),
        )
    }
}

/// Selects the transition from a red into a blue state that holds the most tails, ties are
/// broken by [`Candidate::priority`].
pub fn most_visited(pdrta: &Pdrta, frontier: &Frontier) -> Option<Candidate> {
    frontier
        .red()
        .filter_map(|s| pdrta.state(s))
        .flat_map(|state| {
            state.all_intervals().filter_map(move |(symbol, interval)| {
                let target = interval.target()?;
                frontier.is_blue(target).then_some(Candidate {
                    source: state.id(),
                    symbol,
                    begin: interval.begin(),
                    end: interval.end(),
                    target,
                    tails: interval.tail_count(),
                })
            })
        })
        .max_by_key(Candidate::priority)
}
