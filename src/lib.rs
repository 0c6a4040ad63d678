//! Library for learning probabilistic deterministic real-time automata (PDRTA) from timed
//! sequences.
//!
//! A PDRTA is a deterministic automaton whose transitions are labelled with a symbol and an
//! interval of delays. Each state partitions the delays of every symbol into intervals, and
//! every interval leads to exactly one successor. Probabilities are not stored explicitly,
//! instead the automaton keeps the sample it was learned from: every word of the sample is
//! represented by its tails, which sit in the intervals the word passes through. Probabilities
//! of ending in a state or taking a transition are the relative frequencies of these tails.
//!
//! Learning follows the RTI+ algorithm. The [`Pdrta`] starts out as the prefix tree of the
//! sample, and the [`learner::RtiPlus`] driver repeatedly picks the transition from the
//! finished (red) part of the automaton into the frontier (blue) that is backed by the most
//! tails. The interval of that transition may be split, its target merged into a red state,
//! or the target is itself colored red. Which refinement is taken is decided by statistical
//! tests (see [`tester`]) on the tails involved.
//!
//! ```
//! use pdrta::prelude::*;
//!
//! let sample: TimedSample = "4 2\n2 a 3 b 10\n2 a 4 b 11\n1 a 3\n0\n".parse().unwrap();
//! let learner = RtiPlus::new(LearnerConfig::default().with_min_data(1)).unwrap();
//! let pdrta = learner.learn(sample).unwrap();
//! assert!(pdrta.check_consistency().is_ok());
//! ```
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use pdrta::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        automaton::{Interval, Pdrta, PdrtaError, State, StateId, Tail, Transition},
        dot::Dottable,
        histogram::{BinLayout, HistogramBins, HistogramError},
        learner::{
            check_distribution, ConfigError, DistributionCheck, Frontier, LearnerConfig,
            Operation, Refinement, RtiPlus, Session, Step, TesterKind, Tolerance,
        },
        math,
        sample::{Alphabet, SampleError, Symbol, Time, TimedSample, TimedWord, MAX_DELAY},
        tester::{FishersMethodTester, LikelihoodRatioTester, OperationTester, Tester},
    };
}

/// This module contains some definitions of mathematical objects which are used throughout the crate and
/// do not really fit to the top level.
pub mod math;

/// Timed words, samples of them and the alphabets they are built over.
pub mod sample;

/// Histograms over delays, used by the statistical tests.
pub mod histogram;

/// The automaton, its states, intervals and tails.
pub mod automaton;
pub use automaton::Pdrta;

/// Export to the DOT format of graphviz.
pub mod dot;

/// Statistical tests that decide whether states are merged and intervals are split.
pub mod tester;

pub mod learner;

/// Random generation of timed samples.
#[cfg(feature = "random")]
pub mod random;
