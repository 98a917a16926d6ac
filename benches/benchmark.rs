use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use url_prober::{
    Config, ProbeEngine, ProbeMethod, ProbeOutcome, ProbeTask, Prober, Tally,
};

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

struct InstantProber;

#[async_trait]
impl Prober for InstantProber {
    async fn probe(&self, task: &ProbeTask) -> ProbeOutcome {
        ProbeOutcome::status(task.as_str(), ProbeMethod::Head, "200 OK", 512, Duration::ZERO)
    }
}

fn benchmark_config_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");
    configure_fast_group(&mut group);

    group.bench_function("creation", |b| {
        b.iter(|| {
            let config = Config::default();
            black_box(config);
        });
    });

    group.finish();
}

fn benchmark_url_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("url_validation");
    configure_fast_group(&mut group);

    let test_urls = vec![
        "https://example.com",
        "http://example.com/path/to/file.iso?mirror=3",
        "invalid-url",
        "",
    ];

    group.bench_function("parse", |b| {
        b.iter(|| {
            for url in &test_urls {
                let result = ProbeTask::parse(url);
                let _ = black_box(result);
            }
        });
    });

    group.finish();
}

fn benchmark_tally(c: &mut Criterion) {
    let mut group = c.benchmark_group("tally");
    configure_fast_group(&mut group);

    let labels = [
        "200 OK",
        "404 Not Found",
        "parse error",
        "request error",
        "size exceeded",
    ];

    group.bench_function("record_1000", |b| {
        b.iter(|| {
            let mut tally = Tally::new();
            for i in 0..1000 {
                tally.record(labels[i % labels.len()]);
            }
            black_box(tally);
        });
    });

    let mut tally = Tally::new();
    for i in 0..1000 {
        tally.record(labels[i % labels.len()]);
    }
    group.bench_function("render", |b| {
        b.iter(|| black_box(tally.to_string()));
    });

    group.finish();
}

fn benchmark_diagnostic_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagnostic_line");
    configure_fast_group(&mut group);

    let outcome = ProbeOutcome::status(
        "https://example.com/archive.tar.gz",
        ProbeMethod::Get,
        "200 OK",
        1_048_576,
        Duration::from_millis(123),
    );

    group.bench_function("status", |b| {
        b.iter(|| black_box(outcome.diagnostic_line()));
    });

    group.finish();
}

fn benchmark_engine_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    configure_fast_group(&mut group);

    let rt = Runtime::new().unwrap();
    let input: String = (0..500)
        .map(|i| format!("http://host.invalid/item/{i}\n"))
        .collect();

    group.bench_function("dispatch_500", |b| {
        b.iter(|| {
            rt.block_on(async {
                let config = Config {
                    max_workers: 16,
                    ..Default::default()
                };
                let engine = ProbeEngine::with_prober(config, Arc::new(InstantProber)).unwrap();
                black_box(engine.start(input.as_bytes()).await)
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_config_creation,
    benchmark_url_validation,
    benchmark_tally,
    benchmark_diagnostic_line,
    benchmark_engine_dispatch
);

criterion_main!(benches);
