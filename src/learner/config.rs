use std::fmt::Display;

use thiserror::Error;

use crate::{
    histogram::{HistogramBins, HistogramError},
    tester::{FishersMethodTester, LikelihoodRatioTester, Tester},
};

/// Errors in the configuration of a learner, reported before any learning takes place.
#[derive(Debug, Clone, PartialEq, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("significance must lie in [0, 1], got {0}")]
    Significance(f64),
    #[error("unsupported distribution check type {0}, expected -1 or a value in 0..=5")]
    DistributionCheck(i32),
    #[error("unsupported tester type {0}, expected a value in 0..=3")]
    Tester(i32),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
}

/// How the distribution check measures the tolerance around occupied delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tolerance {
    /// No tolerance, every unused delay may be cut off.
    Gaps,
    /// Median plus 2.5 median absolute deviations of the gaps between occupied delays.
    Mad,
    /// Upper outlier fence of the gaps between occupied delays, based on the quartiles.
    Outliers,
}

/// The distribution check splits intervals that obviously contain unused delays before any
/// statistical test is made. It always trims unused margins before the first and after the
/// last occupied delay; with `inner` set it also cuts out large gaps between occupied delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DistributionCheck {
    /// Intervals are only split by statistical tests.
    #[default]
    Disabled,
    /// Split around unused delays.
    Enabled {
        /// How large an unused range must be to be cut off.
        tolerance: Tolerance,
        /// Whether gaps between occupied delays are cut, too.
        inner: bool,
    },
}

impl DistributionCheck {
    /// The check with the given tolerance measure that also cuts inner gaps.
    pub fn inner(tolerance: Tolerance) -> Self {
        DistributionCheck::Enabled {
            tolerance,
            inner: true,
        }
    }

    /// The check with the given tolerance measure that only trims margins.
    pub fn margins(tolerance: Tolerance) -> Self {
        DistributionCheck::Enabled {
            tolerance,
            inner: false,
        }
    }

    /// Returns true unless the check is disabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, DistributionCheck::Disabled)
    }

    /// The numeric code of the check as used on the command line.
    pub fn code(&self) -> i32 {
        match self {
            DistributionCheck::Disabled => -1,
            DistributionCheck::Enabled { tolerance, inner } => {
                let base = match tolerance {
                    Tolerance::Gaps => 0,
                    Tolerance::Mad => 2,
                    Tolerance::Outliers => 4,
                };
                base + i32::from(*inner)
            }
        }
    }
}

impl TryFrom<i32> for DistributionCheck {
    type Error = ConfigError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let tolerance = match value {
            -1 => return Ok(DistributionCheck::Disabled),
            0 | 1 => Tolerance::Gaps,
            2 | 3 => Tolerance::Mad,
            4 | 5 => Tolerance::Outliers,
            _ => return Err(ConfigError::DistributionCheck(value)),
        };
        Ok(DistributionCheck::Enabled {
            tolerance,
            inner: value % 2 == 1,
        })
    }
}

impl Display for DistributionCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionCheck::Disabled => write!(f, "disabled"),
            DistributionCheck::Enabled { tolerance, inner } => write!(
                f,
                "{tolerance:?} ({})",
                if *inner { "inner gaps" } else { "margins" }
            ),
        }
    }
}

/// The statistical test used to score refinements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TesterKind {
    /// Pooled likelihood ratio test of the immediate futures.
    #[default]
    LikelihoodRatio,
    /// Pooled likelihood ratio test of all reachable futures.
    RecursiveLikelihoodRatio,
    /// Likelihood ratio test without pooling.
    NaiveLikelihoodRatio,
    /// Pooled comparisons combined with Fisher's method.
    FishersMethod,
}

impl TesterKind {
    /// Instantiates the tester.
    pub fn tester(&self) -> Tester {
        match self {
            TesterKind::LikelihoodRatio => LikelihoodRatioTester::new(false).into(),
            TesterKind::RecursiveLikelihoodRatio => LikelihoodRatioTester::new(true).into(),
            TesterKind::NaiveLikelihoodRatio => LikelihoodRatioTester::naive().into(),
            TesterKind::FishersMethod => FishersMethodTester.into(),
        }
    }

    /// The numeric code of the tester as used on the command line.
    pub fn code(&self) -> i32 {
        match self {
            TesterKind::LikelihoodRatio => 0,
            TesterKind::RecursiveLikelihoodRatio => 1,
            TesterKind::NaiveLikelihoodRatio => 2,
            TesterKind::FishersMethod => 3,
        }
    }
}

impl TryFrom<i32> for TesterKind {
    type Error = ConfigError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TesterKind::LikelihoodRatio,
            1 => TesterKind::RecursiveLikelihoodRatio,
            2 => TesterKind::NaiveLikelihoodRatio,
            3 => TesterKind::FishersMethod,
            _ => return Err(ConfigError::Tester(value)),
        })
    }
}

/// Parameters of [`super::RtiPlus`].
#[derive(Clone, Debug, PartialEq)]
pub struct LearnerConfig {
    /// Threshold separating significant differences (split) from indistinguishable futures
    /// (merge).
    pub significance: f64,
    /// The heuristic applied before testing.
    pub distribution_check: DistributionCheck,
    /// The statistical test.
    pub tester: TesterKind,
    /// Minimum number of tails for a comparison, also used by the distribution check.
    pub min_data: usize,
    /// Histogram bins for comparing delays.
    pub histogram: HistogramBins,
    /// Whether the distribution check runs over the whole prefix tree before learning.
    pub expand: bool,
    /// Whether the automaton is checked for consistency after every iteration.
    pub check_each_step: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            distribution_check: DistributionCheck::Disabled,
            tester: TesterKind::default(),
            min_data: 10,
            histogram: HistogramBins::default(),
            expand: false,
            check_each_step: false,
        }
    }
}

impl LearnerConfig {
    /// Sets the significance level.
    pub fn with_significance(mut self, significance: f64) -> Self {
        self.significance = significance;
        self
    }

    /// Sets the distribution check. Expansion of the prefix tree is switched on for every
    /// check except the gap based margin trimming, and switched off if the check is disabled.
    pub fn with_distribution_check(mut self, check: DistributionCheck) -> Self {
        self.distribution_check = check;
        self.expand = check.code() >= 1;
        self
    }

    /// Sets the tester.
    pub fn with_tester(mut self, tester: TesterKind) -> Self {
        self.tester = tester;
        self
    }

    /// Sets the minimum amount of data.
    pub fn with_min_data(mut self, min_data: usize) -> Self {
        self.min_data = min_data;
        self
    }

    /// Sets the histogram bins.
    pub fn with_histogram(mut self, histogram: HistogramBins) -> Self {
        self.histogram = histogram;
        self
    }

    /// Overrides whether the prefix tree is expanded before learning.
    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    /// Sets whether consistency is checked after every iteration.
    pub fn with_consistency_checks(mut self, check_each_step: bool) -> Self {
        self.check_each_step = check_each_step;
        self
    }

    /// Verifies that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.significance) {
            return Err(ConfigError::Significance(self.significance));
        }
        self.histogram.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        for code in -1..=5 {
            let check = DistributionCheck::try_from(code).unwrap();
            assert_eq!(check.code(), code);
        }
        assert_eq!(
            DistributionCheck::try_from(3),
            Ok(DistributionCheck::inner(Tolerance::Mad))
        );
        assert_eq!(
            DistributionCheck::try_from(6),
            Err(ConfigError::DistributionCheck(6))
        );
        for code in 0..=3 {
            assert_eq!(TesterKind::try_from(code).unwrap().code(), code);
        }
        assert_eq!(TesterKind::try_from(-2), Err(ConfigError::Tester(-2)));
    }

    #[test]
    fn validation() {
        assert!(LearnerConfig::default().validate().is_ok());
        assert_eq!(
            LearnerConfig::default().with_significance(1.5).validate(),
            Err(ConfigError::Significance(1.5))
        );
        assert!(LearnerConfig::default()
            .with_significance(f64::NAN)
            .validate()
            .is_err());
        assert!(LearnerConfig::default()
            .with_histogram(HistogramBins::Borders(vec![3, 1]))
            .validate()
            .is_err());
    }

    #[test]
    fn expand_follows_check() {
        let config = LearnerConfig::default();
        assert!(!config.expand);
        let config = config.with_distribution_check(DistributionCheck::margins(Tolerance::Gaps));
        assert!(!config.expand);
        let config = config.with_distribution_check(DistributionCheck::inner(Tolerance::Gaps));
        assert!(config.expand);
        assert!(!config.with_expand(false).expand);
    }
}
