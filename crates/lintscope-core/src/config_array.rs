//! A validated fragment sequence and its per-path results
//!
//! A [`ConfigArray`] is built once per configuration source. Every fragment
//! is validated up front, so a broken source fails before any path is
//! classified. Path results and merged configurations are memoized; paths
//! selected by the same fragments share one [`NormalizedConfig`].

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::{ConfigWarning, IgnoreReason, PathDiagnostic};
use crate::fragment::ConfigFragment;
use crate::loader::SourceFingerprint;
use crate::matcher::{Classification, PathMatcher};
use crate::merge::{FragmentMerger, NormalizedConfig};
use crate::result::Result;
use crate::schema::SchemaRegistry;

/// Whether a configuration applies to a path
#[derive(Debug, Clone)]
pub enum Verdict {
    Ignored(IgnoreReason),
    NotMatched,
    Matched(Arc<NormalizedConfig>),
}

/// Result of resolving one (possibly virtual) path
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub verdict: Verdict,
    /// Indices of the fragments that contributed, in sequence order
    pub fragments: Vec<usize>,
}

impl ResolvedPath {
    pub fn config(&self) -> Option<&Arc<NormalizedConfig>> {
        match &self.verdict {
            Verdict::Matched(config) => Some(config),
            _ => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self.verdict, Verdict::Matched(_))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self.verdict, Verdict::Ignored(_))
    }

    /// Why no configuration applies, if none does
    pub fn ignore_reason(&self) -> Option<IgnoreReason> {
        match &self.verdict {
            Verdict::Ignored(reason) => Some(reason.clone()),
            Verdict::NotMatched => Some(IgnoreReason::Unmatched),
            Verdict::Matched(_) => None,
        }
    }

    /// Warning for an explicitly requested path that receives no configuration
    pub fn diagnostic(&self) -> Option<PathDiagnostic> {
        self.ignore_reason()
            .map(|reason| PathDiagnostic::new(&self.path, reason))
    }
}

/// Builder for [`ConfigArray`]
#[derive(Debug)]
pub struct ConfigArrayBuilder {
    base_path: PathBuf,
    defaults: Vec<ConfigFragment>,
    fragments: Vec<ConfigFragment>,
    source: Option<PathBuf>,
    fingerprint: Option<SourceFingerprint>,
    warnings: Vec<ConfigWarning>,
    schema: Option<Arc<SchemaRegistry>>,
}

impl ConfigArrayBuilder {
    /// Built-in fragments, always placed first
    pub fn defaults(mut self, defaults: Vec<ConfigFragment>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn fragment(mut self, fragment: ConfigFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn fragments<I>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = ConfigFragment>,
    {
        self.fragments.extend(fragments);
        self
    }

    /// The file the fragments were loaded from
    pub fn source(mut self, path: PathBuf, fingerprint: Option<SourceFingerprint>) -> Self {
        self.source = Some(path);
        self.fingerprint = fingerprint;
        self
    }

    pub fn warning(mut self, warning: ConfigWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn schema(mut self, schema: Arc<SchemaRegistry>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Validate every fragment and compile the pattern matcher
    pub fn build(self) -> Result<ConfigArray> {
        let schema = self.schema.unwrap_or_default();
        let default_count = self.defaults.len();
        let fragments: Vec<Arc<ConfigFragment>> = self
            .defaults
            .into_iter()
            .chain(self.fragments)
            .map(Arc::new)
            .collect();

        for fragment in &fragments {
            if let Err(err) = schema.validate_fragment(fragment) {
                tracing::debug!("Invalid config fragment {}: {}", fragment.label(), err);
                return Err(err);
            }
        }

        let matcher = PathMatcher::new(&self.base_path, &fragments, default_count)?;

        tracing::debug!(
            "Built config array with {} fragment(s) for {}",
            fragments.len(),
            self.base_path.display()
        );

        Ok(ConfigArray {
            base_path: self.base_path,
            fragments,
            default_count,
            source: self.source,
            fingerprint: self.fingerprint,
            warnings: self.warnings,
            matcher,
            merger: FragmentMerger::new(schema),
            resolved: DashMap::new(),
            merged: DashMap::new(),
        })
    }
}

/// One normalized fragment sequence plus its caches
#[derive(Debug)]
pub struct ConfigArray {
    base_path: PathBuf,
    fragments: Vec<Arc<ConfigFragment>>,
    default_count: usize,
    source: Option<PathBuf>,
    fingerprint: Option<SourceFingerprint>,
    warnings: Vec<ConfigWarning>,
    matcher: PathMatcher,
    merger: FragmentMerger,
    resolved: DashMap<PathBuf, Arc<ResolvedPath>>,
    merged: DashMap<Vec<usize>, Arc<NormalizedConfig>>,
}

impl ConfigArray {
    pub fn builder(base_path: impl Into<PathBuf>) -> ConfigArrayBuilder {
        ConfigArrayBuilder {
            base_path: base_path.into(),
            defaults: Vec::new(),
            fragments: Vec::new(),
            source: None,
            fingerprint: None,
            warnings: Vec::new(),
            schema: None,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn fragments(&self) -> &[Arc<ConfigFragment>] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of leading built-in fragments
    pub fn default_count(&self) -> usize {
        self.default_count
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn fingerprint(&self) -> Option<&SourceFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Number of memoized path results
    pub fn cached_paths(&self) -> usize {
        self.resolved.len()
    }

    /// Number of distinct merged configurations built so far
    pub fn cached_configs(&self) -> usize {
        self.merged.len()
    }

    /// Resolve a path; relative paths are taken relative to the base path
    pub fn resolve(&self, path: &Path) -> Result<Arc<ResolvedPath>> {
        let path = if path.is_relative() {
            self.base_path.join(path)
        } else {
            path.to_path_buf()
        };

        if let Some(hit) = self.resolved.get(&path) {
            return Ok(hit.clone());
        }

        let (verdict, fragments) = match self.matcher.classify(&path) {
            Classification::Ignored(reason) => {
                tracing::trace!("{} ignored: {:?}", path.display(), reason);
                (Verdict::Ignored(reason), Vec::new())
            }
            Classification::NotMatched => (Verdict::NotMatched, Vec::new()),
            Classification::Matched(indices) => {
                let config = self.merged_config(&indices)?;
                (Verdict::Matched(config), indices)
            }
        };

        let resolved = Arc::new(ResolvedPath {
            path: path.clone(),
            verdict,
            fragments,
        });
        Ok(self.resolved.entry(path).or_insert(resolved).clone())
    }

    /// Effective configuration for a path, `None` when ignored or unmatched
    pub fn config_for(&self, path: &Path) -> Result<Option<Arc<NormalizedConfig>>> {
        Ok(self.resolve(path)?.config().cloned())
    }

    pub fn is_file_ignored(&self, path: &Path) -> bool {
        self.matcher.ignore_reason(path).is_some()
    }

    pub fn is_directory_ignored(&self, directory: &Path) -> bool {
        self.matcher.is_directory_ignored(directory)
    }

    fn merged_config(&self, indices: &[usize]) -> Result<Arc<NormalizedConfig>> {
        if let Some(hit) = self.merged.get(indices) {
            return Ok(hit.clone());
        }

        let config = Arc::new(
            self.merger
                .merge(indices.iter().map(|&index| self.fragments[index].as_ref()))?,
        );
        Ok(self
            .merged
            .entry(indices.to_vec())
            .or_insert(config)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;
    use crate::value::ConfigValue;
    use serde_json::json;

    fn fragment(value: serde_json::Value) -> ConfigFragment {
        ConfigFragment::from_value(&ConfigValue::from(value)).unwrap()
    }

    fn array(fragments: Vec<ConfigFragment>) -> ConfigArray {
        ConfigArray::builder("/project")
            .defaults(crate::defaults::default_fragments(&crate::defaults::builtin_plugin()))
            .fragments(fragments)
            .build()
            .unwrap()
    }

    #[test]
    fn test_shared_config_per_fragment_set() {
        let array = array(vec![fragment(json!({"rules": {"semi": "error"}}))]);

        let a = array.resolve(Path::new("/project/a.js")).unwrap();
        let b = array.resolve(Path::new("/project/src/b.js")).unwrap();
        assert!(Arc::ptr_eq(a.config().unwrap(), b.config().unwrap()));
        assert_eq!(a.config().unwrap().severity("semi"), Severity::Error);
        assert_eq!(array.cached_configs(), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let array = array(vec![]);

        let first = array.resolve(Path::new("/project/a.js")).unwrap();
        let second = array.resolve(Path::new("a.js")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(array.cached_paths(), 1);
    }

    #[test]
    fn test_invalid_fragment_fails_before_classification() {
        let err = ConfigArray::builder("/project")
            .fragment(fragment(json!({"files": ["**/*.js"], "rulez": {}})))
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), r#"Unexpected key "rulez" found."#);
    }

    #[test]
    fn test_unmatched_reason() {
        let array = array(vec![]);
        let resolved = array.resolve(Path::new("/project/notes.txt")).unwrap();
        assert!(!resolved.is_matched());
        assert_eq!(resolved.ignore_reason(), Some(IgnoreReason::Unmatched));
        assert_eq!(
            resolved.diagnostic().unwrap().message,
            "File ignored because no matching configuration was supplied."
        );
    }

    #[test]
    fn test_merge_error_surfaces_on_resolution() {
        let array = array(vec![fragment(json!({
            "files": ["**/*.ts"],
            "rules": {"ts/no-any": "error"}
        }))]);

        assert!(array.resolve(Path::new("/project/a.js")).is_ok());
        let err = array.resolve(Path::new("/project/a.ts")).unwrap_err();
        assert_eq!(err.to_string(), r#"Key "rules": Key "ts/no-any": Could not find plugin "ts"."#);
    }
}
