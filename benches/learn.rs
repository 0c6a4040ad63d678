use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdrta::{prelude::*, random::RandomSource};

fn bench_prefix_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_tree");
    for words in [100, 1000] {
        let sample = RandomSource::new(3, 4, 3, 100).sample(words).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(words), &sample, |b, sample| {
            b.iter(|| black_box(Pdrta::new(sample.clone(), HistogramBins::default(), 10).size()))
        });
    }
    group.finish();
}

fn bench_learn(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn");
    group.sample_size(10);
    let sample = RandomSource::new(11, 4, 2, 50).sample(500).unwrap();
    for kind in [
        TesterKind::LikelihoodRatio,
        TesterKind::RecursiveLikelihoodRatio,
        TesterKind::FishersMethod,
    ] {
        let learner = RtiPlus::new(LearnerConfig::default().with_tester(kind)).unwrap();
        group.bench_with_input(
            BenchmarkId::new("tester", format!("{kind:?}")),
            &sample,
            |b, sample| b.iter(|| black_box(learner.learn(sample.clone()).unwrap().size())),
        );
    }
    let learner = RtiPlus::new(
        LearnerConfig::default().with_distribution_check(DistributionCheck::inner(Tolerance::Mad)),
    )
    .unwrap();
    group.bench_with_input(
        BenchmarkId::new("distribution_check", "mad"),
        &sample,
        |b, sample| b.iter(|| black_box(learner.learn(sample.clone()).unwrap().size())),
    );
    group.finish();
}

criterion_group!(benches, bench_prefix_tree, bench_learn);
criterion_main!(benches);
