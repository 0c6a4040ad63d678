use itertools::Itertools;
use tracing::trace;

use crate::{
    automaton::{Interval, Pdrta, StateId, Tail},
    learner::Frontier,
    sample::{Symbol, Time},
};

/// Result of comparing two samples of tails: a likelihood ratio statistic that is
/// asymptotically chi-squared distributed with `degrees` degrees of freedom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evidence {
    /// The statistic `2 Σ x ln(x / E[x])` over all cells.
    pub statistic: f64,
    /// Degrees of freedom of the statistic.
    pub degrees: usize,
}

impl Evidence {
    /// Evidence that carries no information.
    pub const NONE: Evidence = Evidence {
        statistic: 0.0,
        degrees: 0,
    };

    /// Returns true if the comparison had at least one degree of freedom.
    pub fn is_informative(&self) -> bool {
        self.degrees > 0
    }

    fn combine(self, other: Evidence) -> Evidence {
        Evidence {
            statistic: self.statistic + other.statistic,
            degrees: self.degrees + other.degrees,
        }
    }
}

/// The pairwise comparison shared by all testers. Two sets of tails are compared by their
/// distribution over the next symbol (including the end of the word) and by the histogram of
/// the next delay. If `recursive` is set, the comparison continues with the tails that
/// follow each interval of a reference state, until one side runs out of tails.
///
/// With `pooled` set, cells that are sparse on both sides are pooled into one, tail sets
/// smaller than the minimum amount of data are not compared, and whenever the first side
/// reaches a red state it is represented by all tails of that state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Comparison<'a> {
    pub(crate) pdrta: &'a Pdrta,
    pub(crate) frontier: &'a Frontier,
    pub(crate) pooled: bool,
    pub(crate) recursive: bool,
}

struct Pending {
    first: Vec<Tail>,
    second: Vec<Tail>,
    reference: Option<StateId>,
}

impl<'a> Comparison<'a> {
    /// Compares the futures of `red` and `blue`, using `red` as the reference structure.
    pub(crate) fn merge(&self, red: StateId, blue: StateId) -> Vec<Evidence> {
        if !self.pdrta.contains_state(red) || !self.pdrta.contains_state(blue) {
            return vec![];
        }
        self.descend(
            Pending {
                first: self.pdrta.tails_of(red),
                second: self.pdrta.tails_of(blue),
                reference: Some(red),
            },
            true,
        )
    }

    /// Compares the tails that follow the two halves of a cut at `at` through the interval of
    /// `state` on `symbol` containing it. Empty if the cut does not fall inside the interval.
    pub(crate) fn split(&self, state: StateId, symbol: Symbol, at: Time) -> Vec<Evidence> {
        let Some(interval) = self.pdrta.interval_at(state, symbol, at) else {
            return vec![];
        };
        if at < interval.begin() || at >= interval.end() {
            return vec![];
        }
        let (left, right): (Vec<_>, Vec<_>) = interval
            .slots()
            .flat_map(|(time, tails)| tails.iter().map(move |t| (time, t.advanced())))
            .partition(|(time, _)| *time <= at);
        self.descend(
            Pending {
                first: left.into_iter().map(|(_, t)| t).collect(),
                second: right.into_iter().map(|(_, t)| t).collect(),
                reference: interval.target(),
            },
            false,
        )
    }

    fn descend(&self, start: Pending, markov: bool) -> Vec<Evidence> {
        let markov = markov && self.pooled;
        let mut evidence = vec![];
        let mut stack = vec![start];
        while let Some(Pending {
            first,
            second,
            reference,
        }) = stack.pop()
        {
            if first.is_empty() || second.is_empty() {
                continue;
            }
            if self.pooled && (first.len() < self.min_data() || second.len() < self.min_data()) {
                continue;
            }
            let result = self.compare(&first, &second);
            trace!(
                "compared {} and {} tails: {result:?}",
                first.len(),
                second.len()
            );
            evidence.push(result);

            if !self.recursive {
                continue;
            }
            let Some(state) = reference.and_then(|r| self.pdrta.state(r)) else {
                continue;
            };
            // pushed in reverse so that intervals are visited in ascending order
            for (symbol, interval) in state.all_intervals().collect_vec().into_iter().rev() {
                let target = interval.target();
                let first = match target {
                    Some(t) if markov && self.frontier.is_red(t) => self.pdrta.tails_of(t),
                    _ => self.follow(&first, symbol, interval),
                };
                stack.push(Pending {
                    first,
                    second: self.follow(&second, symbol, interval),
                    reference: target,
                });
            }
        }
        evidence
    }

    /// The tails that continue after taking `interval` on `symbol`.
    fn follow(&self, tails: &[Tail], symbol: Symbol, interval: &Interval) -> Vec<Tail> {
        tails
            .iter()
            .filter(|t| {
                self.pdrta
                    .next_event(t)
                    .is_some_and(|(s, time)| s == symbol && interval.contains(time))
            })
            .map(Tail::advanced)
            .collect()
    }

    fn min_data(&self) -> usize {
        self.pdrta.min_data()
    }

    fn compare(&self, first: &[Tail], second: &[Tail]) -> Evidence {
        let (first_symbols, first_times) = self.histograms(first);
        let (second_symbols, second_times) = self.histograms(second);
        let pool = self.pooled.then_some(self.min_data());
        likelihood_ratio(&first_symbols, &second_symbols, pool)
            .combine(likelihood_ratio(&first_times, &second_times, pool))
    }

    /// Counts per next symbol (the last cell counts words that end) and per histogram bin of
    /// the next delay.
    fn histograms(&self, tails: &[Tail]) -> (Vec<usize>, Vec<usize>) {
        let mut symbols = vec![0; self.pdrta.alphabet_size() + 1];
        let mut times = vec![0; self.pdrta.bins().len()];
        for tail in tails {
            match self.pdrta.next_event(tail) {
                Some((symbol, time)) => {
                    symbols[symbol] += 1;
                    times[self.pdrta.bins().bin_of(time)] += 1;
                }
                None => symbols[self.pdrta.alphabet_size()] += 1,
            }
        }
        (symbols, times)
    }
}

/// Likelihood ratio statistic for the hypothesis that the counts `first` and `second` are
/// drawn from the same distribution. With `pool = Some(n)`, all cells that hold fewer than
/// `n` observations on both sides are merged into one cell, which is dropped if it still
/// holds fewer than `n` observations on both sides.
pub(crate) fn likelihood_ratio(first: &[usize], second: &[usize], pool: Option<usize>) -> Evidence {
    let mut cells = vec![];
    let mut pooled = (0, 0);
    for (&x, &y) in first.iter().zip(second) {
        match pool {
            Some(min) if x < min && y < min => {
                pooled.0 += x;
                pooled.1 += y;
            }
            _ => cells.push((x, y)),
        }
    }
    if let Some(min) = pool {
        if pooled.0 >= min || pooled.1 >= min {
            cells.push(pooled);
        }
    }
    cells.retain(|(x, y)| x + y > 0);

    let total_first: usize = cells.iter().map(|c| c.0).sum();
    let total_second: usize = cells.iter().map(|c| c.1).sum();
    if total_first == 0 || total_second == 0 || cells.len() < 2 {
        return Evidence::NONE;
    }
    let (n1, n2) = (total_first as f64, total_second as f64);
    let statistic = cells
        .iter()
        .map(|&(x, y)| {
            let (x, y) = (x as f64, y as f64);
            x_ln_ratio(x, n1) + x_ln_ratio(y, n2) - x_ln_ratio(x + y, n1 + n2)
        })
        .sum::<f64>()
        * 2.0;
    Evidence {
        statistic: statistic.max(0.0),
        degrees: cells.len() - 1,
    }
}

/// `x ln(x / n)`, continuously extended by 0 at `x = 0`.
fn x_ln_ratio(x: f64, n: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        x * (x / n).ln()
    }
}
