use std::collections::BTreeMap;

use super::{Interval, StateId, Tail};
use crate::sample::{Symbol, Time};

/// A state of a [`super::Pdrta`]. For every symbol the state holds an ordered partition of
/// the time domain into [`Interval`]s, stored by their upper bound. Tails of words that end
/// in this state are kept separately.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct State {
    id: StateId,
    intervals: Vec<BTreeMap<Time, Interval>>,
    ends: Vec<Tail>,
}

impl State {
    /// Creates a state whose partition consists of a single interval `[0, max_time]`
    /// for each of the `symbols` symbols.
    pub(crate) fn new(id: StateId, symbols: usize, max_time: Time) -> Self {
        Self {
            id,
            intervals: (0..symbols)
                .map(|_| BTreeMap::from([(max_time, Interval::new(0, max_time))]))
                .collect(),
            ends: vec![],
        }
    }

    /// The id of the state.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Iterates over the intervals for `symbol` in ascending order of time.
    pub fn intervals(&self, symbol: Symbol) -> impl DoubleEndedIterator<Item = &Interval> + '_ {
        self.intervals
            .get(symbol)
            .into_iter()
            .flat_map(|partition| partition.values())
    }

    /// Iterates over all intervals of all symbols, ordered by symbol and then time.
    pub fn all_intervals(&self) -> impl Iterator<Item = (Symbol, &Interval)> + '_ {
        self.intervals
            .iter()
            .enumerate()
            .flat_map(|(symbol, partition)| partition.values().map(move |i| (symbol, i)))
    }

    pub(crate) fn all_intervals_mut(&mut self) -> impl Iterator<Item = &mut Interval> + '_ {
        self.intervals.iter_mut().flat_map(|p| p.values_mut())
    }

    /// Number of intervals for `symbol`.
    pub fn interval_count(&self, symbol: Symbol) -> usize {
        self.intervals.get(symbol).map_or(0, BTreeMap::len)
    }

    /// Returns the interval for `symbol` that contains `time`. The last interval is open to
    /// the right, so delays beyond the time domain resolve to it.
    pub fn interval_at(&self, symbol: Symbol, time: Time) -> Option<&Interval> {
        let partition = self.intervals.get(symbol)?;
        partition
            .range(time..)
            .next()
            .or_else(|| partition.iter().next_back())
            .map(|(_, interval)| interval)
    }

    pub(crate) fn interval_at_mut(&mut self, symbol: Symbol, time: Time) -> Option<&mut Interval> {
        let key = self.interval_key(symbol, time)?;
        self.intervals.get_mut(symbol)?.get_mut(&key)
    }

    /// Key (upper bound) of the interval containing `time`.
    pub(crate) fn interval_key(&self, symbol: Symbol, time: Time) -> Option<Time> {
        self.interval_at(symbol, time).map(Interval::end)
    }

    pub(crate) fn interval_by_key_mut(&mut self, symbol: Symbol, key: Time) -> Option<&mut Interval> {
        self.intervals.get_mut(symbol)?.get_mut(&key)
    }

    /// Cuts the interval of `symbol` that contains `at` into `[begin, at]` and `[at + 1, end]`.
    /// Returns false, and leaves the partition untouched, if `at` is the upper bound of its
    /// interval.
    pub(crate) fn split_interval(&mut self, symbol: Symbol, at: Time) -> bool {
        let Some(key) = self.interval_key(symbol, at) else {
            return false;
        };
        let Some(partition) = self.intervals.get_mut(symbol) else {
            return false;
        };
        let Some(mut left) = partition.remove(&key) else {
            return false;
        };
        if at < left.begin() || at >= left.end() {
            partition.insert(key, left);
            return false;
        }
        let right = left.split_off(at);
        partition.insert(right.end(), right);
        partition.insert(left.end(), left);
        true
    }

    /// Tails of words that end in this state.
    pub fn ends(&self) -> &[Tail] {
        &self.ends
    }

    pub(crate) fn push_end(&mut self, tail: Tail) {
        self.ends.push(tail);
    }

    /// Number of tails using `symbol` out of this state.
    pub fn symbol_tail_count(&self, symbol: Symbol) -> usize {
        self.intervals(symbol).map(Interval::tail_count).sum()
    }

    /// Total number of tails in this state, including those that end here.
    pub fn tail_count(&self) -> usize {
        self.intervals
            .iter()
            .flat_map(|p| p.values())
            .map(Interval::tail_count)
            .sum::<usize>()
            + self.ends.len()
    }

    /// All tails in this state: first those leaving by symbol and delay, then those that end.
    pub fn tails(&self) -> impl Iterator<Item = Tail> + '_ {
        self.all_intervals()
            .flat_map(|(_, interval)| interval.tails().copied())
            .chain(self.ends.iter().copied())
    }

    /// Iterates over the targets of all intervals that have one.
    pub fn successors(&self) -> impl Iterator<Item = StateId> + '_ {
        self.all_intervals().filter_map(|(_, i)| i.target())
    }

    pub(crate) fn into_parts(self) -> (Vec<BTreeMap<Time, Interval>>, Vec<Tail>) {
        (self.intervals, self.ends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_split() {
        let mut state = State::new(0, 2, 100);
        assert_eq!(state.interval_count(0), 1);
        assert!(state.split_interval(0, 10));
        assert!(state.split_interval(0, 50));
        assert!(!state.split_interval(0, 50));
        assert!(!state.split_interval(0, 100));
        let bounds: Vec<_> = state.intervals(0).map(|i| (i.begin(), i.end())).collect();
        assert_eq!(bounds, vec![(0, 10), (11, 50), (51, 100)]);
        assert_eq!(state.interval_at(0, 11).unwrap().begin(), 11);
        assert_eq!(state.interval_at(0, 500).unwrap().end(), 100);
        assert_eq!(state.interval_count(1), 1);
        assert!(state.interval_at(2, 0).is_none());
    }
}
