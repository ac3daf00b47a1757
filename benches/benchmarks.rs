//! Benchmark suite for quality-check subsystems.
//!
//! This module provides performance benchmarks for:
//! - Issue classification
//! - Reporter rendering
//! - The warm type-check path (cache hit, no `tsc` spawn)
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

use quality_check::quality::engines::typescript::TypeCacheEntry;
use quality_check::quality::{
    CheckerResult, Engine, EngineContext, Issue, IssueClassifier, QualityCheckResult, Tool,
    TypeEngine,
};
use quality_check::report::{reporter_for, AgentMode, OutputFormat, ReportOptions};

const RULES: &[&str] = &[
    "prettier/prettier",
    "no-unused-vars",
    "complexity",
    "TS2322",
    "made-up/rule",
];

fn sample_issues(count: usize) -> Vec<Issue> {
    (0..count)
        .map(|i| {
            Issue::error(Tool::Lint, format!("issue number {i}"))
                .with_location(format!("/proj/src/file{}.ts", i % 10), i as u32 + 1, 1)
                .with_rule(RULES[i % RULES.len()])
        })
        .collect()
}

fn sample_result(count: usize) -> QualityCheckResult {
    let mut checkers = BTreeMap::new();
    checkers.insert(Tool::Lint, CheckerResult::from_issues(sample_issues(count)));
    QualityCheckResult::new(checkers, 42, "bench")
}

// ============================================================================
// Classification Benchmarks
// ============================================================================

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    let classifier = IssueClassifier::default();

    for size in [10, 100, 1000] {
        let issues = sample_issues(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("classify_all", size), &issues, |b, issues| {
            b.iter(|| black_box(classifier.classify_all(black_box(issues))))
        });
    }

    group.finish();
}

// ============================================================================
// Reporter Benchmarks
// ============================================================================

fn bench_reporters(c: &mut Criterion) {
    let mut group = c.benchmark_group("reporters");
    let result = sample_result(200);
    let classified = IssueClassifier::default().classify_all(result.issues());

    for format in [OutputFormat::Cli, OutputFormat::Json, OutputFormat::Agent] {
        let options = ReportOptions {
            format,
            agent_mode: AgentMode::Detailed,
            max_items: 50,
            verbose: true,
            root: None,
        };
        let reporter = reporter_for(&options);
        group.bench_function(format!("{:?}", format).to_lowercase(), |b| {
            b.iter(|| black_box(reporter.report(black_box(&result), black_box(&classified))))
        });
    }

    group.finish();
}

// ============================================================================
// Warm Type-Check Benchmarks
// ============================================================================

fn bench_warm_type_check(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("tsconfig.json"), "{}").unwrap();

    let mut files = Vec::new();
    for i in 0..20 {
        let file = root.join(format!("src/mod{i}.ts"));
        fs::write(&file, format!("export const v{i} = {i};\n")).unwrap();
        files.push(file);
    }

    let engine = TypeEngine::new(cache.path());
    let store = engine.cache_store(root);
    for file in &files {
        let key = file.strip_prefix(root).unwrap().to_string_lossy().into_owned();
        let entry = TypeCacheEntry::capture(file, vec![root.join("tsconfig.json")], vec![]).unwrap();
        store.put(&key, entry).unwrap();
    }

    let ctx = EngineContext::new(root);
    let mut group = c.benchmark_group("type_engine");
    group.bench_function("warm_single_file", |b| {
        b.iter(|| black_box(engine.check(&ctx, &files[..1]).unwrap()))
    });
    group.throughput(Throughput::Elements(files.len() as u64));
    group.bench_function("warm_twenty_files", |b| {
        b.iter(|| black_box(engine.check(&ctx, &files).unwrap()))
    });
    group.finish();
}

criterion_group!(classifier_benches, bench_classification, bench_reporters);

criterion_group!(engine_benches, bench_warm_type_check);

criterion_main!(classifier_benches, engine_benches);
