//! Criterion benchmarks for log_config_manager

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use log_config_manager::prelude::*;
use log_config_manager::registry::payload::{LOG_FILE, LOG_LEVEL, LOG_NAMES};
use std::sync::Arc;

struct NullAppender;

impl Appender for NullAppender {
    fn append(&mut self, _record: &LogRecord) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

struct NullFactory;

impl AppenderFactory for NullFactory {
    fn create(&self, _spec: &WriterSpec, _template: &str) -> Result<Box<dyn Appender>> {
        Ok(Box::new(NullAppender))
    }
}

fn manager_with_rules(rules: usize) -> LogConfigManager {
    let manager = LogConfigManager::builder()
        .settings(ManagerSettings::new().root_dir("/srv/bench"))
        .factory(Arc::new(NullFactory))
        .build()
        .expect("Failed to build manager");

    for i in 0..rules {
        let payload = ConfigPayload::new()
            .with(LOG_LEVEL, "DEBUG")
            .with(LOG_NAMES, format!("app.module{}, app.module{}.io", i, i))
            .with(LOG_FILE, format!("logs/shard{}.log", i % 8));
        manager
            .update_config(&format!("rule{}", i), Some(&payload))
            .expect("Failed to apply rule");
    }
    manager
}

// ============================================================================
// Resolution Benchmarks
// ============================================================================

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let manager = manager_with_rules(64);

    group.bench_function("exact", |b| {
        b.iter(|| black_box(manager.resolve(black_box("app.module10"))));
    });

    group.bench_function("deep_prefix", |b| {
        b.iter(|| black_box(manager.resolve(black_box("app.module10.io.socket.reader.buffer"))));
    });

    group.bench_function("root_fallback", |b| {
        b.iter(|| black_box(manager.resolve(black_box("org.other.component"))));
    });

    group.finish();
}

// ============================================================================
// Reload Pass Benchmarks
// ============================================================================

fn bench_reload_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("reload_pass");

    for rules in [8, 64, 256] {
        let manager = manager_with_rules(rules);
        group.throughput(Throughput::Elements(rules as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rules), &rules, |b, _| {
            b.iter(|| manager.reload().expect("Failed to reload"));
        });
    }

    group.finish();
}

// ============================================================================
// Pattern Translation Benchmarks
// ============================================================================

fn bench_pattern_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_translation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("legacy", |b| {
        b.iter(|| {
            black_box(log_config_manager::translate_pattern(black_box(
                "{0,date,dd.MM.yyyy HH:mm:ss.SSS} *{4}* [{2}] {3} {5}",
            )))
        });
    });

    group.bench_function("native", |b| {
        b.iter(|| {
            black_box(log_config_manager::translate_pattern(black_box(
                "%d{dd.MM.yyyy HH:mm:ss.SSS} *%level* [%thread] %logger %msg%n",
            )))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolution,
    bench_reload_pass,
    bench_pattern_translation
);
criterion_main!(benches);
