use itertools::Itertools;
use pdrta::{prelude::*, random::RandomSource};

fn sample(alphabet: usize, words: Vec<Vec<(Symbol, Time)>>) -> TimedSample {
    TimedSample::from_words(alphabet, words.into_iter().map(TimedWord::new)).unwrap()
}

/// Every word leaves one tail in every state it passes through, including the one it ends in.
fn total_tails(sample: &TimedSample) -> usize {
    sample.words().map(|w| w.len() + 1).sum()
}

#[test_log::test]
fn distribution_check_separates_distant_delays() {
    let sample = sample(2, vec![vec![(0, 5), (1, 1)], vec![(0, 5), (1, 9)]]);
    let mut pdrta = Pdrta::new(sample, HistogramBins::Count(2), 2);
    let check = DistributionCheck::try_from(1).unwrap();
    let root = pdrta.root();

    check_distribution(&mut pdrta, root, 0, check).unwrap();
    let a = pdrta.successor(root, 0, 5).unwrap();
    assert!(check_distribution(&mut pdrta, a, 1, check).unwrap());

    let state = pdrta.state(a).unwrap();
    assert!(state.interval_count(1) >= 2);
    let low = state.interval_at(1, 1).unwrap();
    let high = state.interval_at(1, 9).unwrap();
    assert_ne!((low.begin(), low.end()), (high.begin(), high.end()));
    assert!(low.end() < 9 && high.begin() > 1);
    pdrta.check_consistency().unwrap();
}

#[test]
fn merge_scores_are_rescaled() {
    let accepted = Refinement::merge(0, 1, 0.10, 0.05).unwrap();
    assert!((accepted.score - 0.05 / 0.95).abs() < 1e-9);
    assert!((accepted.score - 0.0526).abs() < 1e-4);
    assert!(Refinement::merge(0, 1, 0.03, 0.05).is_none());
}

#[test_log::test]
fn merge_adopts_bounds_of_folded_interval() {
    // a: root -a-> A, which ends; b: root -b-> B -a@5-> X
    let sample = sample(2, vec![vec![(0, 20)], vec![(1, 20), (0, 5)]]);
    let mut pdrta = Pdrta::new(sample, HistogramBins::Count(2), 2);
    let root = pdrta.root();
    let a = pdrta.successor(root, 0, 20).unwrap();
    let b = pdrta.successor(root, 1, 20).unwrap();
    assert!(pdrta.split(b, 0, 10).unwrap());
    let x = pdrta.successor(b, 0, 5).unwrap();
    let folded = pdrta.state(b).unwrap().interval_at(0, 5).unwrap();
    assert_eq!((folded.begin(), folded.end()), (0, 10));

    pdrta.merge(a, b).unwrap();

    assert!(!pdrta.contains_state(b));
    assert!(pdrta.transitions().all(|t| t.target != b));
    let adopted = pdrta.state(a).unwrap().interval_at(0, 5).unwrap();
    assert_eq!((adopted.begin(), adopted.end()), (0, 10));
    assert_eq!(adopted.target(), Some(x));
    assert_eq!(pdrta.successor(root, 1, 20), Some(a));
    pdrta.check_consistency().unwrap();
}

#[test]
fn learning_is_deterministic() {
    let sample = RandomSource::new(5, 3, 2, 30).sample(300).unwrap();
    let learner = RtiPlus::new(
        LearnerConfig::default().with_distribution_check(DistributionCheck::inner(Tolerance::Mad)),
    )
    .unwrap();
    let first = learner.learn(sample.clone()).unwrap();
    let second = learner.learn(sample).unwrap();
    assert_eq!(format!("{first:?}"), format!("{second:?}"));
    assert_eq!(first.dot_representation(), second.dot_representation());
}

#[test_log::test]
fn every_configuration_terminates_consistently() {
    let sample = RandomSource::new(17, 3, 2, 20).sample(150).unwrap();
    let tails = total_tails(&sample);
    for (tester, check) in (0..=3).cartesian_product(-1..=5) {
        let config = LearnerConfig::default()
            .with_tester(TesterKind::try_from(tester).unwrap())
            .with_distribution_check(DistributionCheck::try_from(check).unwrap())
            .with_min_data(5);
        let learner = RtiPlus::new(config).unwrap();
        let pdrta = learner.learn(sample.clone()).unwrap();

        pdrta.check_consistency().unwrap();
        assert!(pdrta.size() >= 1);
        assert_eq!(
            pdrta.states().map(State::tail_count).sum::<usize>(),
            tails,
            "tester {tester}, check {check}"
        );
        assert_eq!(
            pdrta.state(pdrta.root()).unwrap().tail_count(),
            sample.len()
                + pdrta
                    .transitions()
                    .filter(|t| t.target == pdrta.root())
                    .map(|t| t.interval.tail_count())
                    .sum::<usize>()
        );
        for word in sample.words() {
            assert!(pdrta.run(word).is_some());
            assert!(pdrta.log_likelihood(word).is_some_and(|l| l <= 0.0));
        }
    }
}

#[test]
fn session_steps_until_settled() {
    let sample = RandomSource::new(23, 2, 2, 10).sample(100).unwrap();
    let learner = RtiPlus::new(LearnerConfig::default().with_consistency_checks(true)).unwrap();
    let mut session = learner.session(sample).unwrap();
    let mut promoted = 0;
    while let Some(step) = session.step().unwrap() {
        if let Step::Promoted(state) = step {
            assert!(session.frontier().is_red(state));
            promoted += 1;
        }
        for blue in session.frontier().blue() {
            assert!(!session.frontier().is_red(blue));
        }
    }
    assert!(session.frontier().is_settled());
    let iterations = session.iteration();
    let (pdrta, reported) = session.finish().unwrap();
    assert_eq!(iterations, reported);
    // the root is red from the start, every other red state was promoted
    assert_eq!(pdrta.size(), promoted + 1);
}

#[test]
fn expansion_reshapes_prefix_tree() {
    let sample = sample(
        1,
        vec![vec![(0, 2), (0, 40)], vec![(0, 3), (0, 41)], vec![(0, 90)]],
    );
    let plain = RtiPlus::new(LearnerConfig::default()).unwrap();
    let expanding = RtiPlus::new(
        LearnerConfig::default().with_distribution_check(DistributionCheck::inner(Tolerance::Gaps)),
    )
    .unwrap();
    assert!(expanding.config().expand);

    let before = plain.initial(sample.clone()).unwrap();
    let after = expanding.initial(sample).unwrap();
    let root = after.root();
    assert_eq!(before.state(root).unwrap().interval_count(0), 1);
    assert!(after.state(root).unwrap().interval_count(0) > 1);
    assert_ne!(after.successor(root, 0, 3), after.successor(root, 0, 90));
    after.check_consistency().unwrap();
}
