use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pprof::criterion::{Output, PProfProfiler};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

use stopsig_core::{Condition, CompletedTrial, Response, StimulusCatalog};
use stopsig_experiment::{ExperimentConfig, PerformanceMonitor, TrialSequenceGenerator};

/// Default pattern repeated `blocks / 2` times so longer sessions keep the
/// same condition mix.
fn pattern(blocks: usize) -> Vec<Condition> {
    let base = ExperimentConfig::default().condition_pattern;
    base.iter().cycle().take(base.len() * blocks / 2).copied().collect()
}

/// Sequence generation for growing session lengths.
pub fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    let config = ExperimentConfig::default();
    let catalog = StimulusCatalog::default();
    for blocks in [2usize, 8, 32] {
        let pattern = pattern(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &pattern, |b, pattern| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| {
                let trials = TrialSequenceGenerator::generate(
                    black_box(pattern),
                    pattern.len(),
                    &config.proportions,
                    &catalog,
                    &mut rng,
                );
                black_box(trials)
            });
        });
    }

    group.finish();
}

/// Block summary over a full block of completed trials.
pub fn bench_summarize(c: &mut Criterion) {
    let config = ExperimentConfig::default();
    let catalog = StimulusCatalog::default();
    let mut rng = StdRng::seed_from_u64(7);
    let trials = TrialSequenceGenerator::generate(
        &config.condition_pattern,
        config.test_len(),
        &config.proportions,
        &catalog,
        &mut rng,
    )
    .unwrap_or_default();
    let block: Vec<CompletedTrial> = trials
        .iter()
        .take(config.test_block_len)
        .enumerate()
        .map(|(i, trial)| {
            let response = match trial.condition {
                Condition::Stop if i % 2 == 0 => Response::Withheld,
                _ => Response::Pressed {
                    key: trial.correct_response,
                    rt_ms: 400.0 + i as f64 * 7.0,
                },
            };
            CompletedTrial::new(*trial, response, None)
        })
        .collect();

    c.bench_function("summarize_block", |b| {
        b.iter_batched(
            || {
                let mut monitor = PerformanceMonitor::new();
                for trial in &block {
                    monitor.record(*trial);
                }
                monitor
            },
            |mut monitor| black_box(monitor.summarize()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
        .confidence_level(0.95)
        .noise_threshold(0.02)
        .significance_level(0.05);
    targets = bench_generate, bench_summarize
}

criterion_main!(benches);
