//! Cascading `files`/`ignores` evaluation
//!
//! Ignore patterns behave like a layered `.gitignore`:
//!
//! - rules are evaluated in declaration order; while a path is not ignored
//!   only plain rules are tested, once it is ignored only negated (`!`)
//!   rules are tested, so ignore/un-ignore/re-ignore chains work;
//! - every ancestor directory of a path is evaluated first, outermost
//!   first, and the first ignored directory hides everything beneath it;
//! - patterns are relative to the base path of the fragment that declared
//!   them, `*` stops at `/`, `**` crosses it, a trailing `/` restricts a
//!   pattern to directories.
//!
//! A path that survives the ignores is matched against each fragment's
//! `files` list. It only counts as matched when at least one matching
//! pattern is more specific than a catch-all like `*` or `src/**`.

use dashmap::DashMap;
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::IgnoreReason;
use crate::error::ConfigError;
use crate::fragment::{ConfigFragment, FilesEntry};
use crate::result::Result;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// `path` relative to `base` with `/` separators, or `None` when outside
pub fn relative_slash_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(segments.join("/"))
}

/// One compiled `files` or `ignores` pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    negated: bool,
    directory_only: bool,
    pattern: Pattern,
    /// For `x/**`: matches the directory `x` itself
    directory_prefix: Option<Pattern>,
    base_path: PathBuf,
}

impl GlobPattern {
    pub fn new(source: &str, base_path: &Path) -> Result<Self> {
        let (negated, body) = match source.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, source),
        };
        let body = body
            .strip_prefix("./")
            .or_else(|| body.strip_prefix('/'))
            .unwrap_or(body);
        let (directory_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        if body.is_empty() {
            return Err(ConfigError::invalid_pattern(source, "pattern is empty"));
        }

        let compile = |text: &str| {
            Pattern::new(text).map_err(|err| ConfigError::invalid_pattern(source, err.msg))
        };

        let directory_prefix = match body.strip_suffix("/**") {
            Some(prefix) if !prefix.is_empty() => Some(compile(prefix)?),
            _ => None,
        };

        Ok(Self {
            source: source.to_string(),
            negated,
            directory_only,
            pattern: compile(body)?,
            directory_prefix,
            base_path: base_path.to_path_buf(),
        })
    }

    /// The pattern as written
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// `*`, `x/*` and `x/**` match everything below their anchor
    pub fn is_universal(&self) -> bool {
        let body = self.source.trim_start_matches('!');
        body == "*" || body.ends_with("/*") || body.ends_with("/**")
    }

    /// Test a base-relative path, ignoring negation
    pub fn matches_relative(&self, relative: &str, is_dir: bool) -> bool {
        let relative = relative.trim_end_matches('/');
        if relative.is_empty() || (self.directory_only && !is_dir) {
            return false;
        }
        if self.pattern.matches_with(relative, MATCH_OPTIONS) {
            return true;
        }
        is_dir
            && self
                .directory_prefix
                .as_ref()
                .is_some_and(|prefix| prefix.matches_with(relative, MATCH_OPTIONS))
    }

    /// Test an absolute path, ignoring negation
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        relative_slash_path(&self.base_path, path)
            .is_some_and(|relative| self.matches_relative(&relative, is_dir))
    }
}

/// One ignore pattern and where it came from
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub glob: GlobPattern,
    /// Declared by a built-in default fragment
    pub default: bool,
}

impl IgnoreRule {
    pub fn reason(&self) -> IgnoreReason {
        let pattern = self.glob.source().to_string();
        if self.default {
            IgnoreReason::Default { pattern }
        } else {
            IgnoreReason::Pattern { pattern }
        }
    }
}

/// Ordered ignore rules evaluated with negation
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(patterns: &[String], base_path: &Path, default: bool) -> Result<Self> {
        let mut rules = Self::new();
        rules.extend(patterns, base_path, default)?;
        Ok(rules)
    }

    pub fn extend(&mut self, patterns: &[String], base_path: &Path, default: bool) -> Result<()> {
        for pattern in patterns {
            self.rules.push(IgnoreRule {
                glob: GlobPattern::new(pattern, base_path)?,
                default,
            });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate one path on its own; returns the rule that left it ignored
    pub fn evaluate(&self, path: &Path, is_dir: bool) -> Option<&IgnoreRule> {
        let mut ignored_by: Option<&IgnoreRule> = None;
        for rule in &self.rules {
            match ignored_by {
                Some(_) if rule.glob.is_negated() && rule.glob.matches(path, is_dir) => {
                    ignored_by = None;
                }
                None if !rule.glob.is_negated() && rule.glob.matches(path, is_dir) => {
                    ignored_by = Some(rule);
                }
                _ => {}
            }
        }
        ignored_by
    }

    /// Evaluate a file beneath `base_path` together with its ancestor directories
    pub fn ignores_file(&self, base_path: &Path, path: &Path) -> Option<&IgnoreRule> {
        let mut directory = base_path.to_path_buf();
        for ancestor in intermediate_directories(base_path, path) {
            directory.push(ancestor);
            if let Some(rule) = self.evaluate(&directory, true) {
                return Some(rule);
            }
        }
        self.evaluate(path, false)
    }
}

/// Directory names between `base_path` and the file name of `path`
fn intermediate_directories<'a>(
    base_path: &Path,
    path: &'a Path,
) -> impl Iterator<Item = &'a std::ffi::OsStr> {
    let names: Vec<&std::ffi::OsStr> = path
        .strip_prefix(base_path)
        .map(|relative| {
            relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(name) => Some(name),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let count = names.len().saturating_sub(1);
    names.into_iter().take(count)
}

#[derive(Debug, Clone)]
enum FilesMatcher {
    One(GlobPattern),
    All(Vec<GlobPattern>),
}

impl FilesMatcher {
    fn compile(entry: &FilesEntry, base_path: &Path) -> Result<Self> {
        match entry {
            FilesEntry::Pattern(pattern) => Ok(FilesMatcher::One(GlobPattern::new(
                pattern, base_path,
            )?)),
            FilesEntry::All(patterns) => patterns
                .iter()
                .map(|pattern| GlobPattern::new(pattern, base_path))
                .collect::<Result<Vec<_>>>()
                .map(FilesMatcher::All),
        }
    }

    fn matches(&self, path: &Path) -> bool {
        let test = |glob: &GlobPattern| glob.matches(path, false) != glob.is_negated();
        match self {
            FilesMatcher::One(glob) => test(glob),
            FilesMatcher::All(globs) => globs.iter().all(test),
        }
    }

    fn is_universal(&self) -> bool {
        match self {
            FilesMatcher::One(glob) => glob.is_universal(),
            FilesMatcher::All(globs) => globs.iter().all(GlobPattern::is_universal),
        }
    }
}

/// Compiled selectors of one non-global fragment
#[derive(Debug, Clone)]
struct FragmentSelector {
    base_path: PathBuf,
    files: Option<Vec<FilesMatcher>>,
    ignores: Option<IgnoreRules>,
}

impl FragmentSelector {
    /// `None` when the fragment does not apply, otherwise whether a
    /// non-universal `files` pattern selected the path
    fn select(&self, path: &Path) -> Option<bool> {
        if let Some(ignores) = &self.ignores
            && ignores.ignores_file(&self.base_path, path).is_some()
        {
            return None;
        }

        let Some(files) = &self.files else {
            return Some(false);
        };

        let mut selected = None;
        for matcher in files.iter().filter(|matcher| matcher.matches(path)) {
            let specific = !matcher.is_universal();
            selected = Some(selected.unwrap_or(false) || specific);
        }
        selected
    }
}

/// Outcome of classifying one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ignored(IgnoreReason),
    NotMatched,
    /// Indices of the applying fragments, in sequence order
    Matched(Vec<usize>),
}

/// Applicability engine for one fragment sequence
#[derive(Debug)]
pub struct PathMatcher {
    base_path: PathBuf,
    ignores: IgnoreRules,
    selectors: Vec<Option<FragmentSelector>>,
    directories: DashMap<PathBuf, Option<IgnoreReason>>,
}

impl PathMatcher {
    /// Compile the patterns of `fragments`; the first `default_count`
    /// fragments are the built-in defaults
    pub fn new(
        base_path: &Path,
        fragments: &[Arc<ConfigFragment>],
        default_count: usize,
    ) -> Result<Self> {
        let mut ignores = IgnoreRules::new();
        let mut selectors = Vec::with_capacity(fragments.len());

        for (index, fragment) in fragments.iter().enumerate() {
            let fragment_base = match &fragment.base_path {
                Some(path) => base_path.join(path),
                None => base_path.to_path_buf(),
            };

            if fragment.is_global_ignore() {
                let patterns = fragment.ignores.as_deref().unwrap_or_default();
                ignores.extend(patterns, &fragment_base, index < default_count)?;
                selectors.push(None);
                continue;
            }

            let files = fragment
                .files
                .as_ref()
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| FilesMatcher::compile(entry, &fragment_base))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?;
            let local_ignores = fragment
                .ignores
                .as_ref()
                .map(|patterns| IgnoreRules::compile(patterns, &fragment_base, false))
                .transpose()?;

            selectors.push(Some(FragmentSelector {
                base_path: fragment_base,
                files,
                ignores: local_ignores,
            }));
        }

        tracing::trace!(
            "Compiled {} global ignore rule(s) for {}",
            ignores.len(),
            base_path.display()
        );

        Ok(Self {
            base_path: base_path.to_path_buf(),
            ignores,
            selectors,
            directories: DashMap::new(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Decide whether `path` is ignored, unmatched, or which fragments apply
    pub fn classify(&self, path: &Path) -> Classification {
        if let Some(reason) = self.ignore_reason(path) {
            return Classification::Ignored(reason);
        }

        let mut indices = Vec::new();
        let mut matched = false;
        for (index, selector) in self.selectors.iter().enumerate() {
            let Some(selector) = selector else {
                continue;
            };
            if let Some(specific) = selector.select(path) {
                indices.push(index);
                matched |= specific;
            }
        }

        if matched {
            Classification::Matched(indices)
        } else {
            Classification::NotMatched
        }
    }

    /// Why `path` is ignored, if it is
    pub fn ignore_reason(&self, path: &Path) -> Option<IgnoreReason> {
        if !path.starts_with(&self.base_path) || path == self.base_path {
            return Some(IgnoreReason::OutsideBasePath);
        }

        let mut directory = self.base_path.clone();
        for name in intermediate_directories(&self.base_path, path) {
            directory.push(name);
            if let Some(reason) = self.directory_reason(&directory) {
                return Some(reason);
            }
        }

        self.ignores.evaluate(path, false).map(IgnoreRule::reason)
    }

    /// Whether a directory, or any directory above it, is ignored
    pub fn is_directory_ignored(&self, directory: &Path) -> bool {
        if !directory.starts_with(&self.base_path) {
            return true;
        }
        if directory == self.base_path {
            return false;
        }

        let mut current = self.base_path.clone();
        let relative = directory
            .strip_prefix(&self.base_path)
            .unwrap_or(Path::new(""));
        for component in relative.components() {
            if let Component::Normal(name) = component {
                current.push(name);
                if self.directory_reason(&current).is_some() {
                    return true;
                }
            }
        }
        false
    }

    /// Verdict for one directory on its own, memoized
    fn directory_reason(&self, directory: &Path) -> Option<IgnoreReason> {
        if let Some(cached) = self.directories.get(directory) {
            return cached.clone();
        }
        let reason = self.ignores.evaluate(directory, true).map(IgnoreRule::reason);
        self.directories
            .insert(directory.to_path_buf(), reason.clone());
        reason
    }
}
