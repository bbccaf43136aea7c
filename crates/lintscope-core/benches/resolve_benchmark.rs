use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lintscope_core::defaults::{builtin_plugin, default_fragments};
use lintscope_core::{ConfigArray, ConfigFragment, ConfigResolver, ConfigValue, ResolverOptions};
use std::hint::black_box;
use std::path::{Path, PathBuf};

// A typical monorepo configuration
const CONFIG: &str = r#"[
    {"ignores": ["**/dist/", "coverage/", "!coverage/keep/"]},
    {"rules": {"semi": "error", "quotes": ["warn", "double"]}},
    {"files": ["packages/*/src/**/*.js"], "rules": {"no-console": "error"}},
    {"files": ["**/*.test.js"], "ignores": ["packages/legacy/**"], "rules": {"no-unused-vars": "off"}},
    {"files": ["**/*.cjs"], "languageOptions": {"sourceType": "commonjs"}}
]"#;

fn fragments() -> Vec<ConfigFragment> {
    let value: serde_json::Value = serde_json::from_str(CONFIG).unwrap();
    ConfigFragment::sequence_from_value(&ConfigValue::from(value)).unwrap()
}

fn paths(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| match i % 5 {
            0 => PathBuf::from(format!("/repo/packages/p{}/src/mod{i}.js", i % 7)),
            1 => PathBuf::from(format!("/repo/packages/p{}/test/mod{i}.test.js", i % 7)),
            2 => PathBuf::from(format!("/repo/packages/p{}/dist/mod{i}.js", i % 7)),
            3 => PathBuf::from(format!("/repo/node_modules/dep{}/index.js", i % 11)),
            _ => PathBuf::from(format!("/repo/scripts/tool{i}.cjs")),
        })
        .collect()
}

fn build_array() -> ConfigArray {
    ConfigArray::builder("/repo")
        .defaults(default_fragments(&builtin_plugin()))
        .fragments(fragments())
        .build()
        .unwrap()
}

/// Benchmark building a validated config array
fn bench_build(c: &mut Criterion) {
    c.bench_function("build_config_array", |b| {
        b.iter(|| black_box(build_array()));
    });
}

/// Benchmark classifying and merging paths, cold and warm
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for count in [100, 1000] {
        let paths = paths(count);

        group.bench_with_input(BenchmarkId::new("cold", count), &paths, |b, paths| {
            b.iter(|| {
                let array = build_array();
                for path in paths {
                    black_box(array.resolve(path).unwrap());
                }
            });
        });

        let array = build_array();
        group.bench_with_input(BenchmarkId::new("warm", count), &paths, |b, paths| {
            b.iter(|| {
                for path in paths {
                    black_box(array.resolve(path).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark the full resolver with an in-memory configuration
fn bench_resolver(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let resolver = ConfigResolver::new(
        ResolverOptions::new("/repo")
            .with_config_file(lintscope_core::ConfigFileMode::Disabled)
            .with_base_config(fragments()),
    )
    .unwrap();
    let paths = paths(1000);

    c.bench_function("resolver_batch_1000", |b| {
        b.iter(|| {
            let batch = runtime.block_on(resolver.resolve_batch(&paths)).unwrap();
            black_box(batch.resolved.len())
        });
    });

    c.bench_function("resolver_single", |b| {
        b.iter(|| {
            runtime
                .block_on(resolver.resolve(Path::new("packages/p1/src/index.js")))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_build, bench_resolve, bench_resolver);
criterion_main!(benches);
