use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Type alias for sets, we use this to hide which type of `HashSet` we are actually using.
pub type Set<S> = fxhash::FxHashSet<S>;
/// Type alias for maps, we use this to hide which type of `HashMap` we are actually using.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;

/// Computes the median of the given values. The values do not have to be sorted, an
/// empty slice has median `0.0`.
/// ```
/// use pdrta::math::median;
/// assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
/// ```
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    median_of_sorted(&sorted)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Computes the median absolute deviation of `values` around the given `median`.
pub fn median_absolute_deviation(values: &[f64], median: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    self::median(&deviations)
}

/// Returns the first and third quartile of an already sorted slice. The quartiles are the
/// medians of the lower and upper half, the middle element of an odd-length slice belongs
/// to neither half.
pub fn quartiles(sorted: &[f64]) -> (f64, f64) {
    debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    let half = sorted.len() / 2;
    let lower = &sorted[..half];
    let upper = &sorted[sorted.len() - half..];
    (median_of_sorted(lower), median_of_sorted(upper))
}

/// Probability that a chi-squared distributed variable with `degrees` degrees of freedom
/// is at least `statistic`. Zero degrees of freedom or a non-positive statistic carry no
/// evidence, for those `1.0` is returned.
pub fn chi_squared_survival(statistic: f64, degrees: usize) -> f64 {
    if degrees == 0 || statistic <= 0.0 || statistic.is_nan() {
        return 1.0;
    }
    match ChiSquared::new(degrees as f64) {
        Ok(distribution) => distribution.sf(statistic).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Compares two floating point numbers for equality within a certain delta.
/// # Example
/// ```
/// use pdrta::math;
/// assert!(math::almost_equal(0.7, 0.71, 0.1));
/// assert!(!math::almost_equal(0.7, 0.91, 0.1));
/// ```
pub fn almost_equal(l: f64, r: f64, delta: f64) -> bool {
    l == r || ((l - r).abs() / (l.abs() + r.abs())) < delta
}
