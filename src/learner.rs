//! Passive learning of [`Pdrta`]s with the RTI+ algorithm.
//!
//! Learning starts from the prefix tree of a sample, whose root is colored red and whose
//! successors of the root are colored blue. In every iteration the transition from a red
//! into a blue state that carries the most tails is considered: the interval may be split,
//! the blue state may be merged into a red state, or, if no statistical test supports
//! either, the blue state is colored red. Learning ends when no blue state is left.

use owo_colors::OwoColorize;
use tracing::{debug, info, trace};

use crate::{
    automaton::{Pdrta, PdrtaError, StateId},
    sample::{Symbol, Time, TimedSample},
    tester::{OperationTester, Tester},
};

mod config;
pub use config::{ConfigError, DistributionCheck, LearnerConfig, TesterKind, Tolerance};

mod frontier;
pub use frontier::{most_visited, Candidate, Frontier};

mod refinement;
pub use refinement::{Operation, Refinement};

mod distribution;
pub use distribution::check_distribution;

/// The RTI+ learner, a validated configuration together with its tester.
#[derive(Clone, Debug, PartialEq)]
pub struct RtiPlus {
    config: LearnerConfig,
    tester: Tester,
}

impl RtiPlus {
    /// Creates a learner after validating `config`.
    pub fn new(config: LearnerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tester = config.tester.tester();
        Ok(Self { config, tester })
    }

    /// The configuration.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// The tester scoring refinements.
    pub fn tester(&self) -> &Tester {
        &self.tester
    }

    /// Builds the prefix tree of `sample`. If expansion is enabled, the distribution check is
    /// applied to every state and symbol of the tree, including the states it creates.
    pub fn initial(&self, sample: TimedSample) -> Result<Pdrta, PdrtaError> {
        let mut pdrta = Pdrta::new(
            sample,
            self.config.histogram.clone(),
            self.config.min_data,
        );
        if self.config.expand && self.config.distribution_check.is_enabled() {
            let before = pdrta.size();
            let mut id = 0;
            while id < pdrta.id_bound() {
                if pdrta.contains_state(id) {
                    for symbol in pdrta.alphabet().universe() {
                        check_distribution(
                            &mut pdrta,
                            id,
                            symbol,
                            self.config.distribution_check,
                        )?;
                    }
                }
                id += 1;
            }
            debug!(
                "expanded prefix tree from {before} to {} states",
                pdrta.size()
            );
        }
        Ok(pdrta)
    }

    /// Starts learning on `sample`, the returned [`Session`] performs one iteration at a time.
    pub fn session(&self, sample: TimedSample) -> Result<Session<'_>, PdrtaError> {
        let pdrta = self.initial(sample)?;
        let frontier = Frontier::new(&pdrta);
        Ok(Session {
            learner: self,
            pdrta,
            frontier,
            iteration: 0,
        })
    }

    /// Learns a [`Pdrta`] from `sample`.
    pub fn learn(&self, sample: TimedSample) -> Result<Pdrta, PdrtaError> {
        let start = std::time::Instant::now();
        info!(
            "learning from {} words with significance {}, distribution check {}, tester {:?}, \
             histogram {} and minimum data {}",
            sample.len(),
            self.config.significance,
            self.config.distribution_check,
            self.config.tester,
            self.config.histogram,
            self.config.min_data
        );
        let session = self.session(sample)?;
        let (pdrta, iterations) = session.finish()?;
        info!(
            "learned automaton with {} states and {} transitions in {iterations} iterations, took {}ms",
            pdrta.size().bold(),
            pdrta.transition_count(),
            start.elapsed().as_millis()
        );
        Ok(pdrta)
    }
}

/// What happened in one iteration of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// The distribution check split intervals of `state` on `symbol`.
    Reshaped {
        /// The red state whose intervals were split.
        state: StateId,
        /// The symbol of the intervals.
        symbol: Symbol,
    },
    /// A refinement was applied.
    Refined(Refinement),
    /// No refinement was supported by the tests, so the state became red.
    Promoted(StateId),
}

/// A learning run in progress. Between two calls to [`Session::step`] the automaton is always
/// consistent, so a run can be interrupted at any point.
#[derive(Clone, Debug)]
pub struct Session<'a> {
    learner: &'a RtiPlus,
    pdrta: Pdrta,
    frontier: Frontier,
    iteration: usize,
}

impl Session<'_> {
    /// The current automaton.
    pub fn pdrta(&self) -> &Pdrta {
        &self.pdrta
    }

    /// The current coloring.
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Number of iterations performed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Performs one iteration. Returns `None` once no transition leads from a red into a
    /// blue state.
    pub fn step(&mut self) -> Result<Option<Step>, PdrtaError> {
        let Some(candidate) = most_visited(&self.pdrta, &self.frontier) else {
            return Ok(None);
        };
        self.iteration += 1;
        debug!(
            "iteration {}: transition {} --{}[{},{}]--> {} with {} tails",
            self.iteration,
            candidate.source,
            candidate.symbol,
            candidate.begin,
            candidate.end,
            candidate.target,
            candidate.tails
        );
        let learner = self.learner;
        let config = &learner.config;

        let step = if check_distribution(
            &mut self.pdrta,
            candidate.source,
            candidate.symbol,
            config.distribution_check,
        )? {
            Step::Reshaped {
                state: candidate.source,
                symbol: candidate.symbol,
            }
        } else if let Some(best) = self
            .splits(&candidate)
            .into_iter()
            .max()
            .or_else(|| self.merges(&candidate).into_iter().max())
        {
            debug!("applying {best}");
            best.apply(&mut self.pdrta)?;
            Step::Refined(best)
        } else {
            debug!("{} state {}", "promoting".green(), candidate.target);
            self.frontier.promote(&self.pdrta, candidate.target);
            Step::Promoted(candidate.target)
        };
        self.frontier.refresh(&self.pdrta);

        if config.check_each_step {
            self.pdrta.check_consistency()?;
        }
        Ok(Some(step))
    }

    /// Split candidates between adjacent occupied delays of the candidate's interval, that the
    /// tester deems significant.
    fn splits(&self, candidate: &Candidate) -> Vec<Refinement> {
        let Some(interval) =
            self.pdrta
                .interval_at(candidate.source, candidate.symbol, candidate.begin)
        else {
            return vec![];
        };
        let significance = self.learner.config.significance;
        let times: Vec<_> = interval.occupied_times().collect();
        times
            .windows(2)
            .filter_map(|pair| {
                let (last, current) = (pair[0], pair[1]);
                let at = last + ((current - last - 1) as f64 / 2.0).round_ties_even() as Time;
                let p = self.learner.tester.score_split(
                    &self.pdrta,
                    &self.frontier,
                    candidate.source,
                    candidate.symbol,
                    at,
                );
                trace!("split of {} after {at}: p = {p}", candidate.source);
                Refinement::split(candidate.source, candidate.symbol, at, p, significance)
            })
            .collect()
    }

    /// Merges of the candidate's target into any red state that the tester deems plausible.
    fn merges(&self, candidate: &Candidate) -> Vec<Refinement> {
        let significance = self.learner.config.significance;
        self.frontier
            .red()
            .filter_map(|red| {
                let p = self.learner.tester.score_merge(
                    &self.pdrta,
                    &self.frontier,
                    red,
                    candidate.target,
                );
                trace!("merge of {} into {red}: p = {p}", candidate.target);
                Refinement::merge(red, candidate.target, p, significance)
            })
            .collect()
    }

    /// Runs the remaining iterations and verifies the result. Returns the automaton together
    /// with the number of iterations.
    pub fn finish(mut self) -> Result<(Pdrta, usize), PdrtaError> {
        while self.step()?.is_some() {}
        if let Some(uncolored) = self
            .pdrta
            .state_ids()
            .find(|s| !self.frontier.is_red(*s))
        {
            return Err(PdrtaError::NotRed(uncolored));
        }
        self.pdrta.check_consistency()?;
        Ok((self.pdrta, self.iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{histogram::HistogramBins, sample::TimedWord};

    fn sample(words: Vec<Vec<(Symbol, Time)>>) -> TimedSample {
        TimedSample::from_words(2, words.into_iter().map(TimedWord::new)).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(
            RtiPlus::new(LearnerConfig::default().with_significance(-0.1)),
            Err(ConfigError::Significance(-0.1))
        );
    }

    #[test_log::test]
    fn single_state_for_memoryless_sample() {
        // half of the words end after every prefix
        let mut words = vec![];
        for length in 0..7usize {
            for _ in 0..(1usize << (6 - length)) {
                words.push(vec![(0, 1); length]);
            }
        }
        let learner = RtiPlus::new(LearnerConfig::default().with_min_data(5)).unwrap();
        let pdrta = learner.learn(sample(words)).unwrap();
        assert_eq!(pdrta.size(), 1);
        assert_eq!(pdrta.successor(pdrta.root(), 0, 1), Some(pdrta.root()));
        // delays beyond the sample resolve to the last interval
        assert_eq!(pdrta.successor(pdrta.root(), 0, 50), Some(pdrta.root()));
    }

    #[test_log::test]
    fn split_separates_timed_behaviour() {
        let mut words = vec![];
        for _ in 0..30 {
            words.push(vec![(0, 1), (0, 1)]);
            words.push(vec![(0, 9), (1, 1)]);
        }
        let learner = RtiPlus::new(LearnerConfig::default().with_min_data(5)).unwrap();
        let mut session = learner.session(sample(words)).unwrap();
        let first = session.step().unwrap();
        assert!(
            matches!(
                first,
                Some(Step::Refined(Refinement {
                    operation: Operation::Split { .. },
                    ..
                }))
            ),
            "{first:?}"
        );
        let (pdrta, _) = session.finish().unwrap();
        let root = pdrta.root();
        assert_ne!(pdrta.successor(root, 0, 1), pdrta.successor(root, 0, 9));
    }

    #[test]
    fn uncolored_states_are_reported() {
        let learner = RtiPlus::new(LearnerConfig::default()).unwrap();
        let pdrta = learner
            .initial(sample(vec![vec![(0, 1)], vec![(1, 2)]]))
            .unwrap();
        let root = pdrta.root();
        // without any red state there is no transition to consider
        let session = Session {
            learner: &learner,
            pdrta,
            frontier: Frontier::default(),
            iteration: 0,
        };
        assert_eq!(session.finish().unwrap_err(), PdrtaError::NotRed(root));
    }

    #[test]
    fn steps_keep_automaton_consistent() {
        let words = vec![
            vec![(0, 1), (1, 3)],
            vec![(1, 2)],
            vec![(0, 4), (0, 4), (1, 1)],
            vec![],
        ];
        let config = LearnerConfig::default()
            .with_min_data(1)
            .with_distribution_check(DistributionCheck::inner(Tolerance::Gaps))
            .with_consistency_checks(true);
        let learner = RtiPlus::new(config).unwrap();
        let mut session = learner.session(sample(words)).unwrap();
        while let Some(step) = session.step().unwrap() {
            trace!("{step:?}");
            session.pdrta().check_consistency().unwrap();
        }
        assert!(session.frontier().is_settled());
        assert!(session.iteration() > 0);
    }
}
