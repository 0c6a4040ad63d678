use itertools::Itertools;
use tracing::debug;

use super::config::{DistributionCheck, Tolerance};
use crate::{
    automaton::{Interval, Pdrta, PdrtaError, StateId},
    math,
    sample::{Symbol, Time},
};

/// Splits unused delays off the interval of `state` on `symbol`. Unused margins before the
/// first and after the last occupied delay are cut off if they are wider than the tolerance;
/// with an inner check, gaps between occupied delays that are wider than twice the tolerance
/// are cut out as well. Returns whether any split occurred.
///
/// Only an undivided interval is checked: nothing happens if `state` already has several
/// intervals on `symbol`, if the interval holds no tails, or if its target is shared with
/// other intervals. Every state and symbol is therefore reshaped at most once.
pub fn check_distribution(
    pdrta: &mut Pdrta,
    state: StateId,
    symbol: Symbol,
    check: DistributionCheck,
) -> Result<bool, PdrtaError> {
    let DistributionCheck::Enabled { tolerance, inner } = check else {
        return Ok(false);
    };
    let points = {
        let mut intervals = pdrta
            .state(state)
            .ok_or(PdrtaError::UnknownState(state))?
            .intervals(symbol);
        let (Some(interval), None) = (intervals.next(), intervals.next()) else {
            return Ok(false);
        };
        if interval.is_empty()
            || interval
                .target()
                .is_some_and(|t| pdrta.tree_below(t).is_none())
        {
            return Ok(false);
        }
        let width = match tolerance {
            Tolerance::Gaps => 0,
            Tolerance::Mad => mad_tolerance(interval, pdrta.min_data()),
            Tolerance::Outliers => outlier_tolerance(interval, pdrta.min_data()),
        };
        split_points(interval, width, inner)
    };

    let mut changed = false;
    for &at in &points {
        changed |= pdrta.split(state, symbol, at)?;
    }
    if changed {
        debug!("distribution check split state {state} on symbol {symbol} at {points:?}");
    }
    Ok(changed)
}

/// Where to cut `interval` so that no unused range wider than `tolerance` remains at its
/// margins and, if `inner` is set, no gap wider than twice the tolerance between occupied
/// delays.
pub(crate) fn split_points(interval: &Interval, tolerance: Time, inner: bool) -> Vec<Time> {
    let (Some(first), Some(last)) = (
        interval.occupied_times().next(),
        interval.occupied_times().next_back(),
    ) else {
        return vec![];
    };
    let mut points = vec![];
    if interval.begin() <= first - tolerance - 1 {
        points.push(first - tolerance - 1);
    }
    if inner {
        for (t, t2) in interval.occupied_times().tuple_windows() {
            if t2 - t - 1 > 2 * tolerance {
                points.push(t + tolerance);
                points.push(t2 - tolerance - 1);
            }
        }
    }
    if interval.end() > last + tolerance {
        points.push(last + tolerance);
    }
    points
}

/// Sizes of the unused ranges between consecutive occupied delays.
fn gaps(interval: &Interval) -> Vec<f64> {
    interval
        .occupied_times()
        .tuple_windows()
        .map(|(t, t2)| (t2 - t - 1) as f64)
        .collect()
}

fn mad_tolerance(interval: &Interval, min_data: usize) -> Time {
    if interval.slot_count() <= 2 {
        return few_slots_tolerance(interval, min_data);
    }
    let gaps = gaps(interval);
    let median = math::median(&gaps);
    let mad = math::median_absolute_deviation(&gaps, median);
    ((median + 2.5 * mad) / 2.0 + 1.0).floor() as Time
}

fn outlier_tolerance(interval: &Interval, min_data: usize) -> Time {
    if interval.slot_count() <= 2 {
        return few_slots_tolerance(interval, min_data);
    }
    let mut gaps = gaps(interval);
    gaps.sort_by(f64::total_cmp);
    let (q1, q3) = math::quartiles(&gaps);
    ((q3 + (q3 - q1) * 1.5) / 2.0 + 1.0).floor() as Time
}

/// Tolerance for intervals with one or two occupied delays, where gap statistics are
/// meaningless. The more data the occupied delays carry and the wider they are apart, the
/// tighter the tolerance.
fn few_slots_tolerance(interval: &Interval, min_data: usize) -> Time {
    let span = (interval.end() - interval.begin() + 1) as f64;
    let slots = interval
        .slots()
        .map(|(t, tails)| (t, tails.len()))
        .collect_vec();
    match slots[..] {
        [(_, size)] if (size as f64) < min_data as f64 / 2.0 => (span * 0.05 + 1.0).floor() as Time,
        [(t1, s1), (t2, s2)] => {
            let perc = (t2 - t1 - 1) as f64 / (interval.end() - interval.begin() - 1) as f64;
            if s1 >= min_data && s2 >= min_data && perc >= 0.2 {
                (span * 0.05 + 1.0).floor() as Time
            } else if (s1 >= min_data || s2 >= min_data) && perc >= 0.2 {
                (span * 0.075 + 1.0).floor() as Time
            } else {
                ((t2 - t1 - 1) as f64 / 2.0 + 1.0).floor() as Time
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automaton::Tail,
        histogram::HistogramBins,
        sample::{TimedSample, TimedWord},
    };

    fn interval(begin: Time, end: Time, slots: &[(Time, usize)]) -> Interval {
        let mut interval = Interval::new(begin, end);
        let mut word = 0;
        for &(time, count) in slots {
            for _ in 0..count {
                interval.insert(time, Tail::new(word, 0));
                word += 1;
            }
        }
        interval
    }

    #[test]
    fn points() {
        let i = interval(0, 20, &[(5, 1), (6, 1), (12, 1)]);
        assert_eq!(split_points(&i, 0, false), vec![4, 12]);
        assert_eq!(split_points(&i, 0, true), vec![4, 6, 11, 12]);
        assert_eq!(split_points(&i, 2, true), vec![2, 8, 9, 14]);
        // a tolerance covering all margins and gaps leaves nothing to do
        assert!(split_points(&i, 8, true).is_empty());
        assert!(split_points(&Interval::new(0, 3), 0, true).is_empty());
    }

    #[test]
    fn tolerances() {
        // gaps 0, 1, 1, 7: median 1, deviations 1, 0, 0, 6 with median 0.5
        let i = interval(0, 50, &[(10, 1), (11, 1), (13, 1), (15, 1), (23, 1)]);
        assert_eq!(mad_tolerance(&i, 10), 2);
        // quartiles of 0, 1, 1, 7 are 0.5 and 4
        assert_eq!(outlier_tolerance(&i, 10), 5);

        // a single sparse slot gets 5% of the interval width
        assert_eq!(few_slots_tolerance(&interval(0, 99, &[(50, 2)]), 10), 6);
        assert_eq!(few_slots_tolerance(&interval(0, 99, &[(50, 5)]), 10), 0);
        // two slots far apart
        let far = interval(0, 99, &[(10, 10), (90, 3)]);
        assert_eq!(few_slots_tolerance(&far, 10), 8);
        let far = interval(0, 99, &[(10, 10), (90, 10)]);
        assert_eq!(few_slots_tolerance(&far, 10), 6);
        // two slots close together
        let close = interval(0, 99, &[(10, 10), (20, 10)]);
        assert_eq!(few_slots_tolerance(&close, 10), 5);
    }

    #[test_log::test]
    fn gap_split_after_common_prefix() {
        let sample = TimedSample::from_words(
            2,
            [vec![(0, 5), (1, 1)], vec![(0, 5), (1, 9)]].map(TimedWord::new),
        )
        .unwrap();
        let mut pdrta = Pdrta::new(sample, HistogramBins::Count(2), 2);
        let root = pdrta.root();
        let inner = DistributionCheck::inner(Tolerance::Gaps);

        // both words share the delay 5, only the margins are cut
        assert!(check_distribution(&mut pdrta, root, 0, inner).unwrap());
        let state = pdrta.state(root).unwrap();
        let occupied = state.intervals(0).filter(|i| !i.is_empty()).collect_vec();
        assert_eq!(occupied.len(), 1);
        assert_eq!((occupied[0].begin(), occupied[0].end()), (5, 5));
        assert!(!check_distribution(&mut pdrta, root, 0, inner).unwrap());

        let a = pdrta.successor(root, 0, 5).unwrap();
        assert!(check_distribution(&mut pdrta, a, 1, inner).unwrap());
        let state = pdrta.state(a).unwrap();
        assert!(state.interval_count(1) >= 2);
        assert_ne!(pdrta.successor(a, 1, 1), pdrta.successor(a, 1, 9));
        pdrta.check_consistency().unwrap();
    }

    #[test]
    fn reshapes_only_once() {
        // a single sparse delay in the middle of [0, 99]
        let sample =
            TimedSample::from_words(2, [vec![(0, 50)], vec![(1, 99)]].map(TimedWord::new)).unwrap();
        let mut pdrta = Pdrta::new(sample, HistogramBins::Count(2), 10);
        let root = pdrta.root();
        let check = DistributionCheck::margins(Tolerance::Mad);
        let bounds = |pdrta: &Pdrta| {
            pdrta
                .state(root)
                .unwrap()
                .intervals(0)
                .map(|i| (i.begin(), i.end()))
                .collect_vec()
        };

        assert!(check_distribution(&mut pdrta, root, 0, check).unwrap());
        assert_eq!(bounds(&pdrta), vec![(0, 43), (44, 56), (57, 99)]);
        assert!(!check_distribution(&mut pdrta, root, 0, check).unwrap());
        assert_eq!(bounds(&pdrta), vec![(0, 43), (44, 56), (57, 99)]);
        pdrta.check_consistency().unwrap();
    }

    #[test]
    fn disabled_or_ambiguous() {
        let sample = TimedSample::from_words(1, [vec![(0, 1)], vec![(0, 9)]].map(TimedWord::new)).unwrap();
        let mut pdrta = Pdrta::new(sample, HistogramBins::Count(2), 2);
        let root = pdrta.root();
        assert!(!check_distribution(&mut pdrta, root, 0, DistributionCheck::Disabled).unwrap());
        pdrta.split(root, 0, 4).unwrap();
        let check = DistributionCheck::inner(Tolerance::Gaps);
        assert!(!check_distribution(&mut pdrta, root, 0, check).unwrap());
        assert_eq!(
            check_distribution(&mut pdrta, 99, 0, check),
            Err(PdrtaError::UnknownState(99))
        );
    }
}
