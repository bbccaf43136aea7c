//! End-to-end resolution tests against configuration files on disk

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lintscope_core::{
    ConfigFileMode, ConfigResolver, ConfigWarning, ErrorKind, IgnoreReason, ResolverOptions,
    Severity,
};
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (path, content) in files {
        let path = temp_dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    temp_dir
}

fn resolver(root: &Path) -> ConfigResolver {
    ConfigResolver::new(ResolverOptions::new(root)).unwrap()
}

#[tokio::test]
async fn test_per_fragment_ignores_select_severity() {
    let temp_dir = project(&[(
        "lintscope.config.json",
        r#"[
            {"rules": {"no-unused-vars": "error"}},
            {"ignores": ["error.js"], "rules": {"no-unused-vars": "warn"}}
        ]"#,
    )]);
    let resolver = resolver(temp_dir.path());

    let error = resolver.resolve(Path::new("error.js")).await.unwrap();
    assert_eq!(error.config().unwrap().severity("no-unused-vars"), Severity::Error);

    let warn = resolver.resolve(Path::new("warn.js")).await.unwrap();
    assert_eq!(warn.config().unwrap().severity("no-unused-vars"), Severity::Warn);
}

#[tokio::test]
async fn test_default_ignore_survives_disabled_ignores() {
    let temp_dir = project(&[
        ("lintscope.config.json", r#"[{"ignores": ["**/*.js"]}]"#),
        ("node_modules/pkg/index.js", ""),
    ]);
    let resolver = ConfigResolver::new(ResolverOptions::new(temp_dir.path()).with_ignore(false))
        .unwrap();

    // The configured ignore is dropped...
    assert!(!resolver.is_path_ignored(Path::new("src/a.js")).await.unwrap());

    // ...but the default one is not, and requesting the file explains why
    let batch = resolver
        .resolve_batch(&["node_modules/pkg/index.js"])
        .await
        .unwrap();
    assert_eq!(batch.resolved.len(), 1);
    assert_eq!(batch.diagnostics.len(), 1);

    let diagnostic = &batch.diagnostics[0];
    assert!(diagnostic.is_default_ignore());
    assert_eq!(
        diagnostic.message,
        "File ignored by default because it is located under the node_modules directory. Use ignore pattern \"!**/node_modules/\" to disable file ignore settings or use \"--no-warn-ignored\" to suppress this warning."
    );
}

#[tokio::test]
async fn test_strict_mode_turns_unmatched_paths_into_errors() {
    let temp_dir = project(&[("lintscope.config.json", "[]")]);
    let resolver = ConfigResolver::new(
        ResolverOptions::new(temp_dir.path()).error_on_unmatched(true),
    )
    .unwrap();

    let err = resolver
        .resolve_batch(&["a.js", "README.txt"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMatch);
    match err {
        lintscope_core::ConfigError::NoMatch { reason, .. } => {
            assert_eq!(reason, IgnoreReason::Unmatched)
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_nearest_config_governs_each_directory() {
    let temp_dir = project(&[
        ("lintscope.config.json", r#"{"rules": {"semi": "error"}}"#),
        ("packages/web/lintscope.config.yaml", "rules:\n  semi: warn\n"),
    ]);
    let resolver = resolver(temp_dir.path());

    let root = resolver.resolve(Path::new("src/a.js")).await.unwrap();
    let web = resolver
        .resolve(Path::new("packages/web/src/b.js"))
        .await
        .unwrap();
    assert_eq!(root.config().unwrap().severity("semi"), Severity::Error);
    assert_eq!(web.config().unwrap().severity("semi"), Severity::Warn);

    assert_eq!(
        resolver
            .find_config_file(Path::new("packages/web/src/b.js"))
            .await
            .unwrap(),
        Some(temp_dir.path().join("packages/web/lintscope.config.yaml"))
    );
}

#[tokio::test]
async fn test_explicit_config_file_uses_cwd_as_base() {
    let temp_dir = project(&[(
        "config/lint.toml",
        "files = [\"src/**/*.js\"]\n\n[rules]\neqeqeq = \"error\"\n",
    )]);

    let resolver = ConfigResolver::new(
        ResolverOptions::new(temp_dir.path())
            .with_config_file(ConfigFileMode::Explicit(PathBuf::from("config/lint.toml"))),
    )
    .unwrap();

    let array = resolver
        .config_array_for_file(Path::new("src/a.js"))
        .await
        .unwrap();
    assert_eq!(array.base_path(), temp_dir.path());

    let in_src = resolver.resolve(Path::new("src/a.js")).await.unwrap();
    let outside = resolver.resolve(Path::new("lib/a.js")).await.unwrap();
    assert_eq!(in_src.config().unwrap().severity("eqeqeq"), Severity::Error);
    assert_eq!(outside.config().unwrap().severity("eqeqeq"), Severity::Off);
}

#[tokio::test]
async fn test_empty_config_warns() {
    let temp_dir = project(&[("lintscope.config.json", "{}")]);
    let resolver = resolver(temp_dir.path());

    let array = resolver
        .config_array_for_file(Path::new("a.js"))
        .await
        .unwrap();
    assert_eq!(
        array.warnings(),
        &[ConfigWarning::EmptyConfig {
            path: temp_dir.path().join("lintscope.config.json")
        }]
    );
    assert!(resolver.resolve(Path::new("a.js")).await.unwrap().is_matched());
}

#[tokio::test]
async fn test_broken_config_fails_every_path() {
    let temp_dir = project(&[(
        "lintscope.config.json",
        r#"[{"files": ["**/*.js"]}, {"rulez": {}}]"#,
    )]);
    let resolver = resolver(temp_dir.path());

    for path in ["a.js", "notes.txt", "node_modules/x.js"] {
        let err = resolver.resolve(Path::new(path)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
    assert_eq!(resolver.cache_stats().load_calls, 1);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let temp_dir = project(&[("lintscope.config.json", r#"{"rules": {"curly": "warn"}}"#)]);
    let resolver = resolver(temp_dir.path());

    let first = resolver.resolve(Path::new("src/a.js")).await.unwrap();
    let second = resolver.resolve(Path::new("./src/../src/a.js")).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let sibling = resolver.resolve(Path::new("src/b.js")).await.unwrap();
    assert!(Arc::ptr_eq(first.config().unwrap(), sibling.config().unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_loads_each_source_once() {
    let temp_dir = project(&[("lintscope.config.json", r#"{"rules": {"semi": "error"}}"#)]);
    let resolver = resolver(temp_dir.path());

    let tasks: Vec<_> = (0..64)
        .map(|index| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                let path = format!("src/dir{}/file{index}.js", index % 4);
                resolver.resolve(Path::new(&path)).await
            })
        })
        .collect();

    for task in tasks {
        let resolved = task.await.unwrap().unwrap();
        assert_eq!(resolved.config().unwrap().severity("semi"), Severity::Error);
    }

    let stats = resolver.cache_stats();
    assert_eq!(stats.load_calls, 1);
    assert_eq!(stats.locate_calls, 4);
    assert_eq!(stats.located_directories, 4);
    assert_eq!(stats.loaded_sources, 1);
}

#[tokio::test]
async fn test_revalidate_evicts_changed_sources() {
    let temp_dir = project(&[("lintscope.config.json", r#"{"rules": {"semi": "error"}}"#)]);
    let config_path = temp_dir.path().join("lintscope.config.json");
    let resolver = resolver(temp_dir.path());

    let before = resolver.resolve(Path::new("a.js")).await.unwrap();
    assert_eq!(before.config().unwrap().severity("semi"), Severity::Error);
    assert!(resolver.revalidate().await.unwrap().is_empty());

    fs::write(&config_path, r#"{"rules": {"semi": "warn", "curly": "warn"}}"#).unwrap();

    // Cached until revalidated
    let stale = resolver.resolve(Path::new("a.js")).await.unwrap();
    assert!(Arc::ptr_eq(&before, &stale));

    assert_eq!(resolver.revalidate().await.unwrap(), vec![config_path]);
    let after = resolver.resolve(Path::new("a.js")).await.unwrap();
    assert_eq!(after.config().unwrap().severity("semi"), Severity::Warn);
    assert_eq!(resolver.cache_stats().load_calls, 2);
}

#[tokio::test]
async fn test_revalidate_after_source_removed() {
    let temp_dir = project(&[
        ("lintscope.config.json", r#"{"rules": {"semi": "error"}}"#),
        ("pkg/lintscope.config.json", r#"{"rules": {"semi": "warn"}}"#),
    ]);
    let resolver = resolver(temp_dir.path());

    let nested = resolver.resolve(Path::new("pkg/a.js")).await.unwrap();
    assert_eq!(nested.config().unwrap().severity("semi"), Severity::Warn);

    fs::remove_file(temp_dir.path().join("pkg/lintscope.config.json")).unwrap();
    resolver.revalidate().await.unwrap();

    let fallback = resolver.resolve(Path::new("pkg/a.js")).await.unwrap();
    assert_eq!(fallback.config().unwrap().severity("semi"), Severity::Error);
}

#[tokio::test]
async fn test_outside_base_path_is_ignored() {
    let temp_dir = project(&[("app/lintscope.config.json", "[]")]);
    let resolver = ConfigResolver::new(
        ResolverOptions::new(temp_dir.path().join("app"))
            .with_config_file(ConfigFileMode::Explicit(PathBuf::from("lintscope.config.json"))),
    )
    .unwrap();

    let resolved = resolver.resolve(Path::new("../other/a.js")).await.unwrap();
    assert_eq!(resolved.ignore_reason(), Some(IgnoreReason::OutsideBasePath));
    assert_eq!(
        resolved.diagnostic().unwrap().message,
        "File ignored because outside of base path."
    );
}
