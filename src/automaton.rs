use std::{
    collections::{BTreeMap, VecDeque},
    fmt::Debug,
};

use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use crate::{
    histogram::{BinLayout, HistogramBins},
    math::{Map, Set},
    sample::{Alphabet, Symbol, Time, TimedSample, TimedWord},
};

mod interval;
pub use interval::Interval;

mod state;
pub use state::State;

mod tail;
pub use tail::Tail;

/// States are stored in an arena and referred to by their position in it.
pub type StateId = usize;

/// Violations of the structural invariants of a [`Pdrta`] and misuse of its mutating
/// operations.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[allow(missing_docs)]
pub enum PdrtaError {
    #[error("state {0} does not exist")]
    UnknownState(StateId),
    #[error("the root cannot be merged into another state")]
    MergeRoot,
    #[error("state {0} cannot be merged with itself")]
    MergeIntoSelf(StateId),
    #[error("the states reachable from {0} do not form a tree")]
    NotATree(StateId),
    #[error("target {target} of state {state} on symbol {symbol} is shared and cannot be split")]
    SharedTarget {
        state: StateId,
        symbol: Symbol,
        target: StateId,
    },
    #[error("intervals of state {state} on symbol {symbol} do not partition the time domain: {reason}")]
    BrokenPartition {
        state: StateId,
        symbol: Symbol,
        reason: String,
    },
    #[error("interval [{begin},{end}] of state {state} on symbol {symbol} points to missing state {target}")]
    DanglingTarget {
        state: StateId,
        symbol: Symbol,
        begin: Time,
        end: Time,
        target: StateId,
    },
    #[error("interval [{begin},{end}] of state {state} on symbol {symbol} holds tails but has no target")]
    MissingTarget {
        state: StateId,
        symbol: Symbol,
        begin: Time,
        end: Time,
    },
    #[error("tail {tail:?} is stored in state {state}, but its next event does not belong there")]
    MisplacedTail { state: StateId, tail: Tail },
    #[error("replaying word {word} diverges from the stored tails at position {position}")]
    Replay { word: usize, position: usize },
    #[error("state {0} is not reachable from the root")]
    Unreachable(StateId),
    #[error("state {0} is left uncolored after learning")]
    NotRed(StateId),
}

/// A probabilistic deterministic real-time automaton. Every transition is labelled with a
/// symbol and an interval of delays. Next to the structure, the automaton keeps the sample
/// it was built from: every word is represented by tails that sit in the states and
/// intervals the word passes through, and all probabilities are derived from those counts.
///
/// The automaton starts out as a prefix tree over the sample (see [`Pdrta::new`]) and is
/// refined through [`Pdrta::split`] and [`Pdrta::merge`].
#[derive(Clone)]
pub struct Pdrta {
    sample: TimedSample,
    states: Vec<Option<State>>,
    root: StateId,
    max_time: Time,
    histogram: HistogramBins,
    bins: BinLayout,
    min_data: usize,
}

impl Pdrta {
    /// Builds the prefix tree of `sample`: one state per distinct prefix, where each state
    /// has a single interval spanning the full time domain for every symbol. The time
    /// domain is `[0, m]` where `m` is the largest delay in the sample.
    pub fn new(sample: TimedSample, histogram: HistogramBins, min_data: usize) -> Self {
        let max_time = sample.max_time();
        let bins = histogram.layout(max_time);
        let mut pdrta = Self {
            sample,
            states: vec![],
            root: 0,
            max_time,
            histogram,
            bins,
            min_data,
        };
        let tails = (0..pdrta.sample.len()).map(|w| Tail::new(w, 0)).collect();
        pdrta.root = pdrta.sprout(tails);
        trace!(
            "built prefix tree with {} states over {:?}",
            pdrta.size(),
            pdrta.alphabet()
        );
        pdrta
    }

    /// Creates a fresh subtree holding `tails` and returns its root. States are added in
    /// breadth-first order, successors of a state ordered by symbol.
    fn sprout(&mut self, tails: Vec<Tail>) -> StateId {
        let root = self.add_state();
        let mut queue = VecDeque::from([(root, tails)]);
        while let Some((id, tails)) = queue.pop_front() {
            let mut state = State::new(id, self.alphabet_size(), self.max_time);
            for tail in tails {
                match tail.next_event(&self.sample) {
                    None => state.push_end(tail),
                    Some((symbol, time)) => {
                        if let Some(interval) = state.interval_at_mut(symbol, time) {
                            interval.insert(time, tail);
                        }
                    }
                }
            }
            for interval in state.all_intervals_mut().filter(|i| !i.is_empty()) {
                let child = self.add_state();
                interval.set_target(Some(child));
                queue.push_back((child, interval.tails().map(Tail::advanced).collect()));
            }
            self.states[id] = Some(state);
        }
        root
    }

    fn sprout_from(&mut self, tails: Vec<Tail>) -> Option<StateId> {
        if tails.is_empty() {
            None
        } else {
            Some(self.sprout(tails))
        }
    }

    fn add_state(&mut self) -> StateId {
        self.states.push(None);
        self.states.len() - 1
    }

    /// Deletes `root` and every state reachable from it.
    fn remove_subtree(&mut self, root: StateId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(state) = self.states.get_mut(id).and_then(Option::take) {
                stack.extend(state.successors());
            }
        }
    }

    /// The sample the automaton was built from.
    pub fn sample(&self) -> &TimedSample {
        &self.sample
    }

    /// The alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        self.sample.alphabet()
    }

    /// Number of symbols.
    pub fn alphabet_size(&self) -> usize {
        self.sample.alphabet().size()
    }

    /// The initial state.
    pub fn root(&self) -> StateId {
        self.root
    }

    /// Upper bound of the time domain.
    pub fn max_time(&self) -> Time {
        self.max_time
    }

    /// The histogram bins as specified.
    pub fn histogram(&self) -> &HistogramBins {
        &self.histogram
    }

    /// The resolved histogram layout used for timing statistics.
    pub fn bins(&self) -> &BinLayout {
        &self.bins
    }

    /// Minimum amount of data per interval that statistical decisions rely on.
    pub fn min_data(&self) -> usize {
        self.min_data
    }

    /// Returns the state with the given id if it exists.
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id).and_then(Option::as_ref)
    }

    fn state_mut(&mut self, id: StateId) -> Result<&mut State, PdrtaError> {
        self.states
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(PdrtaError::UnknownState(id))
    }

    /// Returns true if a state with the given id exists.
    pub fn contains_state(&self, id: StateId) -> bool {
        self.state(id).is_some()
    }

    /// Iterates over all states in ascending order of their ids.
    pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
        self.states.iter().flatten()
    }

    /// Iterates over the ids of all states in ascending order.
    pub fn state_ids(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states().map(State::id)
    }

    /// Upper bound (exclusive) for the ids of all states that exist or have existed.
    pub fn id_bound(&self) -> usize {
        self.states.len()
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.states().count()
    }

    /// Iterates over all transitions, i.e. intervals that have a target.
    pub fn transitions(&self) -> impl Iterator<Item = Transition<'_>> + '_ {
        self.states().flat_map(|state| {
            state.all_intervals().filter_map(move |(symbol, interval)| {
                interval.target().map(|target| Transition {
                    source: state.id(),
                    symbol,
                    interval,
                    target,
                })
            })
        })
    }

    /// Number of transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions().count()
    }

    /// Returns the interval that `state` uses to read `symbol` after a delay of `time`.
    pub fn interval_at(&self, state: StateId, symbol: Symbol, time: Time) -> Option<&Interval> {
        self.state(state)?.interval_at(symbol, time)
    }

    /// Returns the successor of `state` on `symbol` after a delay of `time`.
    pub fn successor(&self, state: StateId, symbol: Symbol, time: Time) -> Option<StateId> {
        self.interval_at(state, symbol, time)?.target()
    }

    /// Runs `word` from the root and returns the reached state, if the run does not leave
    /// the automaton.
    pub fn run(&self, word: &TimedWord) -> Option<StateId> {
        word.events()
            .try_fold(self.root, |state, (symbol, time)| {
                self.successor(state, symbol, time)
            })
    }

    /// All tails currently held by `state`.
    pub fn tails_of(&self, state: StateId) -> Vec<Tail> {
        self.state(state)
            .map(|s| s.tails().collect())
            .unwrap_or_default()
    }

    /// The next event of `tail` in the underlying sample.
    pub fn next_event(&self, tail: &Tail) -> Option<(Symbol, Time)> {
        tail.next_event(&self.sample)
    }

    /// Collects the states reachable from `root`, provided they form a tree that is only
    /// entered through a single interval and does not contain the initial state.
    pub(crate) fn tree_below(&self, root: StateId) -> Option<Vec<StateId>> {
        let mut incoming: Map<StateId, usize> = Map::default();
        for transition in self.transitions() {
            *incoming.entry(transition.target).or_default() += 1;
        }
        let mut visited = Set::default();
        let mut stack = vec![root];
        let mut tree = vec![];
        while let Some(id) = stack.pop() {
            if id == self.root
                || !visited.insert(id)
                || incoming.get(&id).copied().unwrap_or(0) != 1
            {
                return None;
            }
            tree.push(id);
            stack.extend(self.state(id)?.successors());
        }
        Some(tree)
    }

    /// Cuts the interval of `state` on `symbol` that contains `at` into `[begin, at]` and
    /// `[at + 1, end]`, distributing the tails by their delay. The target of the old
    /// interval must not be shared; its subtree is replaced by one subtree per half that
    /// is grown from the tails of that half. Returns `Ok(false)` if `at` is the upper bound
    /// of its interval, in which case nothing changes.
    pub fn split(&mut self, state: StateId, symbol: Symbol, at: Time) -> Result<bool, PdrtaError> {
        let interval = self
            .state(state)
            .ok_or(PdrtaError::UnknownState(state))?
            .interval_at(symbol, at)
            .ok_or(PdrtaError::UnknownState(state))?;
        if at < interval.begin() || at >= interval.end() {
            return Ok(false);
        }
        let target = interval.target();
        if let Some(target) = target {
            if self.tree_below(target).is_none() {
                return Err(PdrtaError::SharedTarget {
                    state,
                    symbol,
                    target,
                });
            }
        }

        let source = self.state_mut(state)?;
        source.split_interval(symbol, at);
        let left = source
            .interval_at(symbol, at)
            .map(|i| i.tails().map(Tail::advanced).collect_vec())
            .unwrap_or_default();
        let right = source
            .interval_at(symbol, at + 1)
            .map(|i| i.tails().map(Tail::advanced).collect_vec())
            .unwrap_or_default();

        if let Some(target) = target {
            self.remove_subtree(target);
            let left_target = self.sprout_from(left);
            let right_target = self.sprout_from(right);
            let source = self.state_mut(state)?;
            if let Some(interval) = source.interval_at_mut(symbol, at) {
                interval.set_target(left_target);
            }
            if let Some(interval) = source.interval_at_mut(symbol, at + 1) {
                interval.set_target(right_target);
            }
        }
        trace!("split state {state} on symbol {symbol} at {at}");
        Ok(true)
    }

    /// Merges `blue` into `red`. Every interval pointing to `blue` is redirected to `red`,
    /// then the tails of `blue` are folded into `red`: tails move into the interval of
    /// `red` containing their delay and the successors of `blue` are folded recursively
    /// into the corresponding successors of `red`. Where `red` has an empty interval, the
    /// interval is cut to the bounds of the incoming interval, which then keeps its target.
    /// `blue` and all folded states are deleted afterwards.
    ///
    /// The states reachable from `blue` must form a tree that does not contain `red`,
    /// which is the case for every state that has not been colored red.
    pub fn merge(&mut self, red: StateId, blue: StateId) -> Result<(), PdrtaError> {
        if !self.contains_state(red) {
            return Err(PdrtaError::UnknownState(red));
        }
        if !self.contains_state(blue) {
            return Err(PdrtaError::UnknownState(blue));
        }
        if blue == self.root {
            return Err(PdrtaError::MergeRoot);
        }
        if red == blue {
            return Err(PdrtaError::MergeIntoSelf(red));
        }
        match self.tree_below(blue) {
            Some(tree) if !tree.contains(&red) => {}
            _ => return Err(PdrtaError::NotATree(blue)),
        }

        for state in self.states.iter_mut().flatten() {
            for interval in state.all_intervals_mut() {
                if interval.target() == Some(blue) {
                    interval.set_target(Some(red));
                }
            }
        }

        let mut pending = VecDeque::from([(red, blue)]);
        while let Some((into, from)) = pending.pop_front() {
            self.fold(into, from, &mut pending)?;
        }
        trace!("merged state {blue} into {red}");
        Ok(())
    }

    fn fold(
        &mut self,
        into: StateId,
        from: StateId,
        pending: &mut VecDeque<(StateId, StateId)>,
    ) -> Result<(), PdrtaError> {
        let (partitions, ends) = self
            .states
            .get_mut(from)
            .and_then(Option::take)
            .ok_or(PdrtaError::UnknownState(from))?
            .into_parts();
        for tail in ends {
            self.state_mut(into)?.push_end(tail);
        }

        for (symbol, partition) in partitions.into_iter().enumerate() {
            for mut interval in partition.into_values() {
                if interval.is_empty() {
                    if let Some(orphan) = interval.target() {
                        self.remove_subtree(orphan);
                    }
                    continue;
                }
                let (begin, end, target) = (interval.begin(), interval.end(), interval.target());

                // group the tails by the interval of `into` they fall in
                let mut groups: BTreeMap<Time, BTreeMap<Time, Vec<Tail>>> = BTreeMap::new();
                for (time, tails) in interval.take_tails() {
                    let key = self
                        .state_mut(into)?
                        .interval_key(symbol, time)
                        .ok_or(PdrtaError::UnknownState(into))?;
                    groups.entry(key).or_default().insert(time, tails);
                }

                let subtrees = if groups.len() == 1 {
                    vec![target]
                } else {
                    if let Some(target) = target {
                        self.remove_subtree(target);
                    }
                    groups
                        .values()
                        .map(|slots| {
                            let advanced = slots.values().flatten().map(Tail::advanced).collect();
                            self.sprout_from(advanced)
                        })
                        .collect()
                };

                for ((key, slots), subtree) in groups.into_iter().zip(subtrees) {
                    let state = self.state_mut(into)?;
                    let existing = state
                        .interval_by_key_mut(symbol, key)
                        .ok_or(PdrtaError::UnknownState(into))?;
                    let adopt = existing.is_empty() && existing.target().is_none();
                    let (lower, upper) = (existing.begin().max(begin), existing.end().min(end));
                    let existing_begin = existing.begin();
                    let existing_target = existing.target();

                    if adopt {
                        if lower > existing_begin {
                            state.split_interval(symbol, lower - 1);
                        }
                        state.split_interval(symbol, upper);
                    }
                    let receiving = state
                        .interval_at_mut(symbol, lower)
                        .ok_or(PdrtaError::UnknownState(into))?;
                    for (time, tails) in slots {
                        receiving.insert_slot(time, tails);
                    }
                    match (existing_target, subtree) {
                        (Some(existing), Some(subtree)) => pending.push_back((existing, subtree)),
                        (None, subtree) => receiving.set_target(subtree),
                        (Some(_), None) => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Verifies the structural invariants: for every state and symbol the intervals
    /// partition `[0, max_time]` without gaps or overlaps, every interval holding tails
    /// points to an existing state, every tail sits where its next event leads, replaying
    /// the sample from the root visits exactly the stored tails, and every state is
    /// reachable from the root.
    pub fn check_consistency(&self) -> Result<(), PdrtaError> {
        for state in self.states() {
            for symbol in self.alphabet().universe() {
                self.check_partition(state, symbol)?;
            }
            for tail in state.ends() {
                if self.next_event(tail).is_some() {
                    return Err(PdrtaError::MisplacedTail {
                        state: state.id(),
                        tail: *tail,
                    });
                }
            }
        }

        for (word_idx, word) in self.sample.words().enumerate() {
            let mut current = self.root;
            for position in 0..=word.len() {
                let tail = Tail::new(word_idx, position);
                let state = self
                    .state(current)
                    .ok_or(PdrtaError::UnknownState(current))?;
                let Some((symbol, time)) = word.get(position) else {
                    if !state.ends().contains(&tail) {
                        return Err(PdrtaError::Replay {
                            word: word_idx,
                            position,
                        });
                    }
                    break;
                };
                let interval = state
                    .interval_at(symbol, time)
                    .filter(|i| i.slots().any(|(t, tails)| t == time && tails.contains(&tail)))
                    .ok_or(PdrtaError::Replay {
                        word: word_idx,
                        position,
                    })?;
                current = interval.target().ok_or(PdrtaError::Replay {
                    word: word_idx,
                    position,
                })?;
            }
        }

        let mut reached = vec![false; self.states.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut reached[id], true) {
                continue;
            }
            if let Some(state) = self.state(id) {
                stack.extend(state.successors());
            }
        }
        if let Some(unreachable) = self.state_ids().find(|id| !reached[*id]) {
            return Err(PdrtaError::Unreachable(unreachable));
        }
        Ok(())
    }

    fn check_partition(&self, state: &State, symbol: Symbol) -> Result<(), PdrtaError> {
        let broken = |reason: String| PdrtaError::BrokenPartition {
            state: state.id(),
            symbol,
            reason,
        };
        let mut expected_begin = 0;
        for interval in state.intervals(symbol) {
            if interval.begin() != expected_begin {
                return Err(broken(format!(
                    "interval {interval:?} should begin at {expected_begin}"
                )));
            }
            if interval.end() < interval.begin() {
                return Err(broken(format!("interval {interval:?} is reversed")));
            }
            match interval.target() {
                Some(target) if !self.contains_state(target) => {
                    return Err(PdrtaError::DanglingTarget {
                        state: state.id(),
                        symbol,
                        begin: interval.begin(),
                        end: interval.end(),
                        target,
                    })
                }
                None if !interval.is_empty() => {
                    return Err(PdrtaError::MissingTarget {
                        state: state.id(),
                        symbol,
                        begin: interval.begin(),
                        end: interval.end(),
                    })
                }
                _ => {}
            }
            for tail in interval.tails() {
                match self.next_event(tail) {
                    Some((s, t)) if s == symbol && interval.contains(t) => {}
                    _ => {
                        return Err(PdrtaError::MisplacedTail {
                            state: state.id(),
                            tail: *tail,
                        })
                    }
                }
            }
            expected_begin = interval.end() + 1;
        }
        if expected_begin != self.max_time + 1 {
            return Err(broken(format!(
                "intervals end at {}, not at {}",
                expected_begin - 1,
                self.max_time
            )));
        }
        Ok(())
    }

    /// Empirical probability that a word ends in `state`.
    pub fn end_probability(&self, state: StateId) -> f64 {
        self.state(state)
            .map(|s| ratio(s.ends().len(), s.tail_count()))
            .unwrap_or(0.0)
    }

    /// Empirical probability that `state` reads `symbol` with a delay in the interval that
    /// contains `time`.
    pub fn transition_probability(&self, state: StateId, symbol: Symbol, time: Time) -> f64 {
        self.state(state)
            .and_then(|s| {
                s.interval_at(symbol, time)
                    .map(|i| ratio(i.tail_count(), s.tail_count()))
            })
            .unwrap_or(0.0)
    }

    /// Natural logarithm of the probability the automaton assigns to `word`, including the
    /// probability of ending after the last event. Returns `None` if the run leaves the
    /// automaton.
    pub fn log_likelihood(&self, word: &TimedWord) -> Option<f64> {
        let mut state = self.root;
        let mut likelihood = 0.0;
        for (symbol, time) in word.events() {
            likelihood += self.transition_probability(state, symbol, time).ln();
            state = self.successor(state, symbol, time)?;
        }
        Some(likelihood + self.end_probability(state).ln())
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// A reference to one transition of a [`Pdrta`].
#[derive(Clone, Copy, Debug)]
pub struct Transition<'a> {
    /// The state the transition leaves.
    pub source: StateId,
    /// The symbol read.
    pub symbol: Symbol,
    /// The interval of delays, holding the tails that take the transition.
    pub interval: &'a Interval,
    /// The state reached.
    pub target: StateId,
}

impl Debug for Pdrta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(
            std::iter::once("State".to_string())
                .chain(
                    self.alphabet()
                        .universe()
                        .map(|s| self.alphabet().name(s).unwrap_or("?").to_string()),
                )
                .chain(std::iter::once("end".to_string())),
        );
        for state in self.states() {
            let mut row = vec![if state.id() == self.root {
                format!("->{}", state.id())
            } else {
                state.id().to_string()
            }];
            for symbol in self.alphabet().universe() {
                row.push(
                    state
                        .intervals(symbol)
                        .filter(|i| i.target().is_some())
                        .map(|i| format!("{i:?}"))
                        .join("\n"),
                );
            }
            row.push(state.ends().len().to_string());
            builder.push_record(row);
        }
        write!(
            f,
            "{}",
            builder
                .build()
                .with(tabled::settings::Style::rounded())
        )
    }
}
