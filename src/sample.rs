use std::{fmt::Debug, ops::Range, str::FromStr};

use bimap::BiBTreeMap;
use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

/// Index of a symbol in the [`Alphabet`].
pub type Symbol = usize;
/// A (relative) point in time. Timed words carry the delay since the previous event.
pub type Time = i64;

/// Largest delay a sample may contain, leaving headroom for arithmetic on interval bounds.
pub const MAX_DELAY: Time = Time::MAX / 4;

/// Abstracts the errors that can occur when building or parsing a [`TimedSample`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[allow(missing_docs)]
pub enum SampleError {
    #[error("missing sample header `<count> <alphabet size>`")]
    MissingHeader,
    #[error("malformed sample header `{0}`")]
    MalformedHeader(String),
    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
    #[error("header announces {expected} sequences, but {found} were given")]
    CountMismatch { expected: usize, found: usize },
    #[error("symbol {symbol} is not part of an alphabet of size {size}")]
    SymbolOutOfRange { symbol: Symbol, size: usize },
    #[error("sequence {word} has negative delay {time}")]
    NegativeTime { word: usize, time: Time },
    #[error("sequence {word} has delay {time}, which exceeds the maximum of {}", MAX_DELAY)]
    TimeOutOfRange { word: usize, time: Time },
}

/// Bijective mapping between the names of symbols and their indices. Indices are handed
/// out consecutively, starting at zero.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Alphabet {
    names: BiBTreeMap<String, Symbol>,
}

impl Alphabet {
    /// Creates an alphabet with `size` symbols that are named by their index.
    pub fn of_size(size: usize) -> Self {
        Self::from_names((0..size).map(|i| i.to_string()))
    }

    /// Creates an alphabet from the given names, duplicates are ignored.
    pub fn from_names<S: Into<String>, I: IntoIterator<Item = S>>(names: I) -> Self {
        let mut alphabet = Self::default();
        for name in names {
            alphabet.insert(name);
        }
        alphabet
    }

    /// Returns the index of `name`, adding it to the alphabet if it is not yet present.
    pub fn insert<S: Into<String>>(&mut self, name: S) -> Symbol {
        let name = name.into();
        if let Some(symbol) = self.names.get_by_left(&name) {
            return *symbol;
        }
        let symbol = self.names.len();
        self.names.insert(name, symbol);
        symbol
    }

    /// The number of symbols.
    pub fn size(&self) -> usize {
        self.names.len()
    }

    /// Looks up the index of the symbol with the given name.
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.names.get_by_left(name).copied()
    }

    /// Looks up the name of the symbol with the given index.
    pub fn name(&self, symbol: Symbol) -> Option<&str> {
        self.names.get_by_right(&symbol).map(|s| s.as_str())
    }

    /// Iterates over all symbol indices in ascending order.
    pub fn universe(&self) -> Range<Symbol> {
        0..self.size()
    }
}

impl Debug for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.universe()
                .map(|sym| self.name(sym).unwrap_or("?"))
                .join(", ")
        )
    }
}

/// A timed word, i.e. a finite sequence of symbols where each symbol carries the delay
/// since the preceding event.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct TimedWord(Vec<(Symbol, Time)>);

impl TimedWord {
    /// Creates a timed word from its events.
    pub fn new(events: Vec<(Symbol, Time)>) -> Self {
        Self(events)
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the word has no events.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the event at `position`, or `None` if the word has ended before.
    pub fn get(&self, position: usize) -> Option<(Symbol, Time)> {
        self.0.get(position).copied()
    }

    /// Iterates over the events.
    pub fn events(&self) -> impl Iterator<Item = (Symbol, Time)> + '_ {
        self.0.iter().copied()
    }

    /// The largest delay in the word.
    pub fn max_time(&self) -> Option<Time> {
        self.0.iter().map(|(_, t)| *t).max()
    }
}

impl From<Vec<(Symbol, Time)>> for TimedWord {
    fn from(value: Vec<(Symbol, Time)>) -> Self {
        Self(value)
    }
}

impl FromIterator<(Symbol, Time)> for TimedWord {
    fn from_iter<T: IntoIterator<Item = (Symbol, Time)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Debug for TimedWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.0.iter().map(|(s, t)| format!("({s},{t})")).join(" ")
        )
    }
}

/// An ordered collection of [`TimedWord`]s over a common [`Alphabet`]. Once built, a sample
/// is immutable.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TimedSample {
    alphabet: Alphabet,
    words: Vec<TimedWord>,
}

impl TimedSample {
    /// Builds a sample, verifying that all symbols belong to `alphabet` and every delay lies
    /// in `[0, MAX_DELAY]`.
    pub fn new<W: Into<TimedWord>, I: IntoIterator<Item = W>>(
        alphabet: Alphabet,
        words: I,
    ) -> Result<Self, SampleError> {
        let words = words.into_iter().map(Into::into).collect_vec();
        for (idx, word) in words.iter().enumerate() {
            for (symbol, time) in word.events() {
                if symbol >= alphabet.size() {
                    return Err(SampleError::SymbolOutOfRange {
                        symbol,
                        size: alphabet.size(),
                    });
                }
                if time < 0 {
                    return Err(SampleError::NegativeTime { word: idx, time });
                }
                if time > MAX_DELAY {
                    return Err(SampleError::TimeOutOfRange { word: idx, time });
                }
            }
        }
        Ok(Self { alphabet, words })
    }

    /// Convenience constructor for an alphabet whose symbols are named by their index.
    pub fn from_words<W: Into<TimedWord>, I: IntoIterator<Item = W>>(
        alphabet_size: usize,
        words: I,
    ) -> Result<Self, SampleError> {
        Self::new(Alphabet::of_size(alphabet_size), words)
    }

    /// Parses a sample in the RTI+ text format. The first line holds the number of
    /// sequences and the alphabet size, every following non-empty line holds one
    /// sequence as `<length> <symbol> <delay> <symbol> <delay> ...`.
    pub fn try_from_lines<S: AsRef<str>, I: IntoIterator<Item = S>>(
        lines: I,
    ) -> Result<Self, SampleError> {
        let mut lines = lines
            .into_iter()
            .enumerate()
            .filter(|(_, line)| !line.as_ref().trim().is_empty());

        let (_, header) = lines.next().ok_or(SampleError::MissingHeader)?;
        let header = header.as_ref().trim();
        let (count, size) = header
            .split_whitespace()
            .map(|n| n.parse::<usize>())
            .collect_tuple()
            .and_then(|(c, s)| Some((c.ok()?, s.ok()?)))
            .ok_or_else(|| SampleError::MalformedHeader(header.to_string()))?;

        let mut alphabet = Alphabet::default();
        let mut words = Vec::with_capacity(count);
        for (idx, line) in lines {
            let malformed = |reason: &str| SampleError::MalformedLine {
                line: idx + 1,
                reason: reason.to_string(),
            };
            let mut tokens = line.as_ref().split_whitespace();
            let length: usize = tokens
                .next()
                .and_then(|l| l.parse().ok())
                .ok_or_else(|| malformed("missing sequence length"))?;
            let tokens = tokens.collect_vec();
            if tokens.len() % 2 == 1 {
                return Err(malformed(&format!(
                    "symbol `{}` has no delay",
                    tokens[tokens.len() - 1]
                )));
            }
            let mut events = Vec::with_capacity(length);
            for (symbol, time) in tokens.into_iter().tuples() {
                let time: Time = time
                    .parse()
                    .map_err(|_| malformed(&format!("invalid delay `{time}`")))?;
                events.push((alphabet.insert(symbol), time));
            }
            if events.len() != length {
                return Err(malformed(&format!(
                    "announced {length} events, found {}",
                    events.len()
                )));
            }
            words.push(TimedWord(events));
        }

        if words.len() != count {
            return Err(SampleError::CountMismatch {
                expected: count,
                found: words.len(),
            });
        }
        if alphabet.size() > size {
            return Err(SampleError::MalformedHeader(format!(
                "{header} (found {} distinct symbols)",
                alphabet.size()
            )));
        }
        // symbols that never occur still belong to the announced alphabet
        for extra in alphabet.size()..size {
            alphabet.insert(format!("#{extra}"));
        }
        debug!("parsed {} sequences over {:?}", words.len(), alphabet);
        Self::new(alphabet, words)
    }

    /// The alphabet of the sample.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Iterates over the words of the sample.
    pub fn words(&self) -> impl Iterator<Item = &TimedWord> + '_ {
        self.words.iter()
    }

    /// Returns the word with the given index.
    pub fn word(&self, index: usize) -> Option<&TimedWord> {
        self.words.get(index)
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if the sample contains no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The largest delay occurring anywhere in the sample, `0` for a sample without events.
    pub fn max_time(&self) -> Time {
        self.words.iter().filter_map(|w| w.max_time()).max().unwrap_or(0)
    }
}

impl FromStr for TimedSample {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_lines(s.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rti_format() {
        let sample: TimedSample = "3 2\n2 a 5 b 1\n2 a 5 b 9\n0\n".parse().unwrap();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.alphabet().size(), 2);
        assert_eq!(sample.alphabet().symbol("b"), Some(1));
        assert_eq!(sample.word(1).unwrap().get(1), Some((1, 9)));
        assert!(sample.word(2).unwrap().is_empty());
        assert_eq!(sample.max_time(), 9);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            TimedSample::from_str(""),
            Err(SampleError::MissingHeader)
        );
        assert!(matches!(
            TimedSample::from_str("x y\n"),
            Err(SampleError::MalformedHeader(_))
        ));
        assert!(matches!(
            TimedSample::from_str("1 1\n2 a 1\n"),
            Err(SampleError::MalformedLine { line: 2, .. })
        ));
        // a symbol without its delay
        assert!(matches!(
            TimedSample::from_str("1 2\n1 a 1 b\n"),
            Err(SampleError::MalformedLine { line: 2, .. })
        ));
        assert!(matches!(
            TimedSample::from_str("2 1\n1 a 1\n"),
            Err(SampleError::CountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn validation() {
        assert_eq!(
            TimedSample::from_words(1, [vec![(1, 3)]].map(TimedWord::new)),
            Err(SampleError::SymbolOutOfRange { symbol: 1, size: 1 })
        );
        assert_eq!(
            TimedSample::from_words(1, [vec![(0, 3)], vec![(0, -1)]].map(TimedWord::new)),
            Err(SampleError::NegativeTime { word: 1, time: -1 })
        );
        assert_eq!(
            TimedSample::from_words(1, [vec![(0, 1)], vec![(0, Time::MAX)]].map(TimedWord::new)),
            Err(SampleError::TimeOutOfRange {
                word: 1,
                time: Time::MAX
            })
        );
        let widest = TimedSample::from_words(1, [vec![(0, MAX_DELAY)]].map(TimedWord::new));
        assert_eq!(widest.map(|s| s.max_time()), Ok(MAX_DELAY));
        assert!(matches!(
            TimedSample::from_str(&format!("1 1\n1 a {}\n", Time::MAX)),
            Err(SampleError::TimeOutOfRange { word: 0, .. })
        ));
    }

    #[test]
    fn unused_symbols_are_kept() {
        let sample: TimedSample = "1 3\n1 x 4\n".parse().unwrap();
        assert_eq!(sample.alphabet().size(), 3);
        assert_eq!(sample.alphabet().symbol("x"), Some(0));
    }
}
