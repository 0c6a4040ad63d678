use std::fmt::Debug;

use crate::sample::{Symbol, Time, TimedSample};

/// The unconsumed suffix of one word of the sample. A tail points at a word and the position
/// of the next event that is still to be read. Which state the tail currently occupies is
/// determined by the collection that holds it: tails are stored in the [`super::Interval`]
/// their next event falls into, or among the ending tails of a [`super::State`] once the
/// word is exhausted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tail {
    word: usize,
    position: usize,
}

impl Tail {
    /// Creates a tail for the word with index `word`, positioned before the event at `position`.
    pub fn new(word: usize, position: usize) -> Self {
        Self { word, position }
    }

    /// Index of the word in the sample.
    pub fn word(&self) -> usize {
        self.word
    }

    /// Number of events of the word that have been consumed.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The tail after consuming the next event.
    pub fn advanced(&self) -> Self {
        Self {
            word: self.word,
            position: self.position + 1,
        }
    }

    /// The next event of the tail, `None` if the word has ended.
    pub fn next_event(&self, sample: &TimedSample) -> Option<(Symbol, Time)> {
        sample.word(self.word).and_then(|w| w.get(self.position))
    }
}

impl Debug for Tail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}@{}", self.word, self.position)
    }
}
