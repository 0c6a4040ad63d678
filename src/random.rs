use tracing::debug;

use crate::sample::{SampleError, Symbol, Time, TimedSample, TimedWord};

/// Longest word that is ever generated.
const MAX_LENGTH: usize = 64;

/// Generates timed words from a hidden random real-time automaton. Every state reads every
/// symbol; the delay is drawn uniformly and decides, by comparison with a cut point that is
/// fixed per state and symbol, which of two successors is reached. After every event the
/// word ends with a fixed probability.
///
/// Generation is driven by a seeded generator, so equal seeds give equal samples.
#[derive(Clone, Debug)]
pub struct RandomSource {
    rng: fastrand::Rng,
    alphabet_size: usize,
    max_time: Time,
    end_probability: f64,
    transitions: Vec<Vec<(Time, usize, usize)>>,
}

impl RandomSource {
    /// Creates a source with `states` hidden states over `alphabet_size` symbols whose
    /// delays lie in `[0, max_time]`.
    pub fn new(seed: u64, states: usize, alphabet_size: usize, max_time: Time) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let (states, alphabet_size, max_time) = (states.max(1), alphabet_size.max(1), max_time.max(1));
        let transitions: Vec<Vec<_>> = (0..states)
            .map(|_| {
                (0..alphabet_size)
                    .map(|_| (rng.i64(0..max_time), rng.usize(..states), rng.usize(..states)))
                    .collect()
            })
            .collect();
        debug!("generated hidden automaton with {states} states: {transitions:?}");
        Self {
            rng,
            alphabet_size,
            max_time,
            end_probability: 0.2,
            transitions,
        }
    }

    /// Sets the probability that a word ends after an event.
    pub fn with_end_probability(mut self, end_probability: f64) -> Self {
        self.end_probability = end_probability.clamp(0.0, 1.0);
        self
    }

    /// Draws a single word.
    pub fn word(&mut self) -> TimedWord {
        let mut state = 0;
        let mut events: Vec<(Symbol, Time)> = vec![];
        while events.len() < MAX_LENGTH && self.rng.f64() >= self.end_probability {
            let symbol = self.rng.usize(..self.alphabet_size);
            let time = self.rng.i64(0..=self.max_time);
            let (cut, low, high) = self.transitions[state][symbol];
            state = if time <= cut { low } else { high };
            events.push((symbol, time));
        }
        TimedWord::new(events)
    }

    /// Draws a sample of `words` words.
    pub fn sample(&mut self, words: usize) -> Result<TimedSample, SampleError> {
        let words: Vec<_> = (0..words).map(|_| self.word()).collect();
        TimedSample::from_words(self.alphabet_size, words)
    }
}
