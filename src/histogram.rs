use std::{fmt::Display, str::FromStr};

use itertools::Itertools;
use thiserror::Error;

use crate::sample::Time;

/// Errors that can occur when specifying histogram bins.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[allow(missing_docs)]
pub enum HistogramError {
    #[error("could not parse histogram bins `{0}`, expected a bin count or borders `-b1-b2-...-bn-`")]
    Malformed(String),
    #[error("histogram borders must be non-negative and strictly increasing, got {0:?}")]
    UnorderedBorders(Vec<Time>),
}

/// Specification of the bins used for the timing histograms that the statistical tests
/// compare. Either the inner borders are given explicitly or only the number of bins, in
/// which case the time domain is cut into bins of equal width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistogramBins {
    /// Inner borders; a border `b` separates the bins `..=b` and `b+1..`.
    Borders(Vec<Time>),
    /// Number of equally wide bins.
    Count(usize),
}

impl Default for HistogramBins {
    fn default() -> Self {
        HistogramBins::Count(4)
    }
}

impl HistogramBins {
    /// Verifies that explicitly given borders are usable.
    pub fn validate(&self) -> Result<(), HistogramError> {
        match self {
            HistogramBins::Borders(borders)
                if borders.first().is_some_and(|b| *b < 0)
                    || borders.windows(2).any(|w| w[0] >= w[1]) =>
            {
                Err(HistogramError::UnorderedBorders(borders.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Resolves the specification into concrete borders for the domain `[0, max_time]`.
    pub fn layout(&self, max_time: Time) -> BinLayout {
        let borders = match self {
            HistogramBins::Borders(borders) => borders.clone(),
            HistogramBins::Count(count) if *count <= 1 => vec![],
            HistogramBins::Count(count) => {
                let width = (max_time + 1) as f64 / *count as f64;
                (1..*count)
                    .map(|k| (k as f64 * width).floor() as Time - 1)
                    .filter(|b| (0..max_time).contains(b))
                    .dedup()
                    .collect()
            }
        };
        BinLayout { borders }
    }
}

impl FromStr for HistogramBins {
    type Err = HistogramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bins = if s.starts_with('-') {
            let borders = s
                .split('-')
                .filter(|b| !b.is_empty())
                .map(|b| b.parse::<Time>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| HistogramError::Malformed(s.to_string()))?;
            HistogramBins::Borders(borders)
        } else {
            HistogramBins::Count(
                s.parse()
                    .map_err(|_| HistogramError::Malformed(s.to_string()))?,
            )
        };
        bins.validate()?;
        Ok(bins)
    }
}

impl Display for HistogramBins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistogramBins::Borders(borders) => write!(f, "-{}-", borders.iter().join("-")),
            HistogramBins::Count(count) => write!(f, "{count}"),
        }
    }
}

/// Concrete histogram layout, obtained from [`HistogramBins::layout`].
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BinLayout {
    borders: Vec<Time>,
}

impl BinLayout {
    /// Number of bins.
    pub fn len(&self) -> usize {
        self.borders.len() + 1
    }

    /// A layout always has at least one bin.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index of the bin that `time` falls into.
    pub fn bin_of(&self, time: Time) -> usize {
        self.borders.partition_point(|b| *b < time)
    }

    /// The inner borders.
    pub fn borders(&self) -> &[Time] {
        &self.borders
    }
}
