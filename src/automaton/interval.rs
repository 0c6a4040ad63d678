use std::{collections::BTreeMap, fmt::Debug};

use super::{StateId, Tail};
use crate::sample::Time;

/// A part `[begin, end]` of the time axis for one (state, symbol) pair. The interval owns
/// the tails whose next event carries the symbol with a delay inside the bounds, grouped by
/// their exact delay, and the state those tails move to.
#[derive(Clone, PartialEq, Eq)]
pub struct Interval {
    begin: Time,
    end: Time,
    tails: BTreeMap<Time, Vec<Tail>>,
    count: usize,
    target: Option<StateId>,
}

impl Interval {
    /// Creates an empty interval without target.
    pub fn new(begin: Time, end: Time) -> Self {
        debug_assert!(begin <= end);
        Self {
            begin,
            end,
            tails: BTreeMap::new(),
            count: 0,
            target: None,
        }
    }

    /// Lower bound (inclusive).
    pub fn begin(&self) -> Time {
        self.begin
    }

    /// Upper bound (inclusive).
    pub fn end(&self) -> Time {
        self.end
    }

    /// Returns true if `time` lies within the bounds.
    pub fn contains(&self, time: Time) -> bool {
        self.begin <= time && time <= self.end
    }

    /// The state reached by taking this interval.
    pub fn target(&self) -> Option<StateId> {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: Option<StateId>) {
        self.target = target;
    }

    /// Number of tails, which is the evidence for this transition.
    pub fn tail_count(&self) -> usize {
        self.count
    }

    /// Returns true if no tail uses the interval.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterates over all tails, ordered by their delay.
    pub fn tails(&self) -> impl Iterator<Item = &Tail> + '_ {
        self.tails.values().flatten()
    }

    /// Iterates over the occupied delays together with the tails that carry them.
    pub fn slots(&self) -> impl Iterator<Item = (Time, &[Tail])> + '_ {
        self.tails.iter().map(|(t, tails)| (*t, tails.as_slice()))
    }

    /// Iterates over the occupied delays in ascending order.
    pub fn occupied_times(&self) -> impl DoubleEndedIterator<Item = Time> + '_ {
        self.tails.keys().copied()
    }

    /// Number of distinct occupied delays.
    pub fn slot_count(&self) -> usize {
        self.tails.len()
    }

    pub(crate) fn insert(&mut self, time: Time, tail: Tail) {
        debug_assert!(self.contains(time), "{time} outside of {self:?}");
        self.tails.entry(time).or_default().push(tail);
        self.count += 1;
    }

    pub(crate) fn insert_slot(&mut self, time: Time, tails: Vec<Tail>) {
        debug_assert!(self.contains(time), "{time} outside of {self:?}");
        self.count += tails.len();
        self.tails.entry(time).or_default().extend(tails);
    }

    /// Cuts the interval after `at`: `self` keeps `[begin, at]` and the returned interval
    /// covers `[at + 1, end]` together with the tails in that range. The returned interval
    /// has no target.
    pub(crate) fn split_off(&mut self, at: Time) -> Interval {
        debug_assert!(self.begin <= at && at < self.end);
        let upper = self.tails.split_off(&(at + 1));
        let moved: usize = upper.values().map(Vec::len).sum();
        self.count -= moved;
        let right = Interval {
            begin: at + 1,
            end: self.end,
            tails: upper,
            count: moved,
            target: None,
        };
        self.end = at;
        right
    }

    /// Takes all tails out of the interval.
    pub(crate) fn take_tails(&mut self) -> BTreeMap<Time, Vec<Tail>> {
        self.count = 0;
        std::mem::take(&mut self.tails)
    }
}

impl Debug for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.begin, self.end)?;
        if let Some(target) = self.target {
            write!(f, "->{target}")?;
        }
        write!(f, "({})", self.count)
    }
}
