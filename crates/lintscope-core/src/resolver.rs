//! Effective configuration lookup for arbitrary paths
//!
//! [`ConfigResolver`] ties the pieces together: it locates the source for a
//! path's directory, materializes that source's [`ConfigArray`] once, and
//! asks the array for the path's verdict. The resolver is cheap to clone and
//! safe to share across tasks; clones share one cache.

use futures::future::join_all;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheStats, ConfigCache};
use crate::config_array::{ConfigArray, ResolvedPath};
use crate::defaults;
use crate::diagnostics::{ConfigWarning, PathDiagnostic};
use crate::error::ConfigError;
use crate::fragment::ConfigFragment;
use crate::loader::{FileSourceLoader, IgnoreFileLoader, SourceFingerprint, SourceLoader};
use crate::locator::{ConfigFileMode, ConfigLocator, LocatedSource};
use crate::plugin::{Plugin, PluginRegistry};
use crate::processor::{Expansion, ProcessorExpander};
use crate::result::{Result, ResultExt};
use crate::schema::SchemaRegistry;

/// Options controlling how configuration is found and combined
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Directory relative paths and explicit config files are resolved against
    pub cwd: PathBuf,
    pub config_file: ConfigFileMode,
    /// Extra global ignore patterns, relative to the cwd
    pub ignore_patterns: Vec<String>,
    /// A `.gitignore`-style file, relative to the cwd
    pub ignore_file: Option<PathBuf>,
    /// Fragments placed before the loaded source
    pub base_config: Vec<ConfigFragment>,
    /// Fragments placed after everything else
    pub override_config: Vec<ConfigFragment>,
    /// When false, only the built-in default and `base_config` ignores apply
    pub ignore: bool,
    /// Resolve with built-in defaults alone when no source file is found
    pub allow_missing_config: bool,
    /// Treat ignored or unmatched requested paths as errors
    pub error_on_unmatched: bool,
    /// Whether fixes will be applied
    pub fix: bool,
    /// Plugin providing the unprefixed rules
    pub builtin_rules: Arc<Plugin>,
    /// Plugins that configuration files may name
    pub plugins: PluginRegistry,
    /// Replacement for the built-in default fragments
    pub default_fragments: Option<Vec<ConfigFragment>>,
}

impl ResolverOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config_file: ConfigFileMode::Search,
            ignore_patterns: Vec::new(),
            ignore_file: None,
            base_config: Vec::new(),
            override_config: Vec::new(),
            ignore: true,
            allow_missing_config: false,
            error_on_unmatched: false,
            fix: false,
            builtin_rules: defaults::builtin_plugin(),
            plugins: PluginRegistry::new(),
            default_fragments: None,
        }
    }

    pub fn with_config_file(mut self, config_file: ConfigFileMode) -> Self {
        self.config_file = config_file;
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_file = Some(path.into());
        self
    }

    pub fn with_base_config(mut self, fragments: Vec<ConfigFragment>) -> Self {
        self.base_config = fragments;
        self
    }

    pub fn with_override_config(mut self, fragments: Vec<ConfigFragment>) -> Self {
        self.override_config = fragments;
        self
    }

    pub fn with_ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn allow_missing_config(mut self, allow: bool) -> Self {
        self.allow_missing_config = allow;
        self
    }

    pub fn error_on_unmatched(mut self, strict: bool) -> Self {
        self.error_on_unmatched = strict;
        self
    }

    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    pub fn with_builtin_rules(mut self, plugin: Arc<Plugin>) -> Self {
        self.builtin_rules = plugin;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_default_fragments(mut self, fragments: Vec<ConfigFragment>) -> Self {
        self.default_fragments = Some(fragments);
        self
    }
}

/// Outcome of resolving many requested paths
#[derive(Debug, Default)]
pub struct BatchResolution {
    /// One entry per requested path, in request order
    pub resolved: Vec<Arc<ResolvedPath>>,
    /// Warnings for requested paths that receive no configuration
    pub diagnostics: Vec<PathDiagnostic>,
}

/// Everything a cache computation needs; holds no reference to the cache
struct ResolverContext {
    options: ResolverOptions,
    cwd: PathBuf,
    locator: ConfigLocator,
    schema: Arc<SchemaRegistry>,
    loader: Arc<dyn SourceLoader>,
}

/// Resolves the effective configuration for paths
#[derive(Clone)]
pub struct ConfigResolver {
    context: Arc<ResolverContext>,
    cache: Arc<ConfigCache>,
}

impl ConfigResolver {
    /// Resolver reading configuration files from disk
    pub fn new(options: ResolverOptions) -> Result<Self> {
        let loader = Arc::new(FileSourceLoader::new(options.plugins.clone()));
        Self::with_loader(options, loader)
    }

    /// Resolver with a custom source loader
    pub fn with_loader(options: ResolverOptions, loader: Arc<dyn SourceLoader>) -> Result<Self> {
        let cwd = absolute_cwd(&options.cwd)?;
        let locator = ConfigLocator::new(&cwd, options.config_file.clone());

        Ok(Self {
            context: Arc::new(ResolverContext {
                options,
                cwd,
                locator,
                schema: Arc::new(SchemaRegistry::new()),
                loader,
            }),
            cache: Arc::new(ConfigCache::new()),
        })
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.context.options
    }

    pub fn cwd(&self) -> &Path {
        &self.context.cwd
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.context.schema
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Make `path` absolute against the cwd and normalize `.` and `..`
    pub fn absolute(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidPath {
                path: String::new(),
                message: "path is empty".to_string(),
            });
        }
        Ok(normalize(&self.context.cwd.join(path)))
    }

    /// Source governing `start_dir`, located at most once per directory
    pub async fn locate(&self, start_dir: &Path) -> Result<Arc<LocatedSource>> {
        let start_dir = self.absolute(start_dir)?;
        let context = self.context.clone();
        let key = start_dir.clone();

        self.cache
            .locations
            .get_or_compute(key, move || async move {
                context.locator.locate(&start_dir).await.map(Arc::new)
            })
            .await
    }

    /// The configuration file that applies to `path`, if any
    pub async fn find_config_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        let path = self.absolute(path)?;
        let located = self.locate(parent_dir(&path)).await?;
        Ok(located.path.clone())
    }

    /// The fragment sequence that applies to `path`, loaded at most once per source
    pub async fn config_array_for_file(&self, path: &Path) -> Result<Arc<ConfigArray>> {
        let path = self.absolute(path)?;
        let directory = parent_dir(&path);
        let located = self.locate(directory).await?;

        if located.path.is_none()
            && self.context.options.config_file == ConfigFileMode::Search
            && !self.context.options.allow_missing_config
        {
            return Err(ConfigError::SourceNotFound {
                start_dir: directory.to_path_buf(),
            });
        }

        self.config_array(&located).await
    }

    async fn config_array(&self, located: &Arc<LocatedSource>) -> Result<Arc<ConfigArray>> {
        let context = self.context.clone();
        let located = located.clone();
        let key = located.path.clone();

        self.cache
            .arrays
            .get_or_compute(key, move || async move {
                context.build_config_array(&located).await.map(Arc::new)
            })
            .await
    }

    /// Verdict and effective configuration for one path
    pub async fn resolve(&self, path: &Path) -> Result<Arc<ResolvedPath>> {
        let path = self.absolute(path)?;
        let array = self.config_array_for_file(&path).await?;
        array.resolve(&path)
    }

    /// Whether `path` is excluded by an ignore pattern
    ///
    /// A path that is merely unmatched is not ignored.
    pub async fn is_path_ignored(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).await?.is_ignored())
    }

    /// Resolve explicitly requested paths concurrently
    ///
    /// Ignored and unmatched paths produce a diagnostic, or a
    /// [`ConfigError::NoMatch`] when `error_on_unmatched` is set. Errors in
    /// the configuration itself abort the batch.
    pub async fn resolve_batch<P>(&self, paths: &[P]) -> Result<BatchResolution>
    where
        P: AsRef<Path>,
    {
        let results = join_all(paths.iter().map(|path| self.resolve(path.as_ref()))).await;

        let mut batch = BatchResolution::default();
        for result in results {
            let Some(resolved) = result.recoverable()? else {
                continue;
            };
            if let Some(reason) = resolved.ignore_reason() {
                if self.context.options.error_on_unmatched {
                    return Err(ConfigError::NoMatch {
                        path: resolved.path.clone(),
                        reason,
                    });
                }
                batch
                    .diagnostics
                    .push(PathDiagnostic::new(&resolved.path, reason));
            }
            batch.resolved.push(resolved);
        }

        tracing::debug!(
            "Resolved {} path(s), {} without configuration",
            batch.resolved.len(),
            batch.diagnostics.len()
        );
        Ok(batch)
    }

    /// Expand `path` through the processor its configuration names
    pub async fn expand(&self, path: &Path, text: &str) -> Result<Expansion> {
        ProcessorExpander::new(self.clone())
            .with_fix(self.context.options.fix)
            .expand(path, text)
            .await
    }

    /// Evict config arrays whose source file changed on disk
    ///
    /// Returns the sources that were evicted. Nothing is reloaded until the
    /// next lookup. A deleted source also drops every located directory,
    /// since the nearest source may now be a different file.
    pub async fn revalidate(&self) -> Result<Vec<PathBuf>> {
        let mut evicted = Vec::new();
        let mut source_removed = false;

        for (key, array) in self.cache.arrays.settled() {
            let Some(source) = key.as_deref() else {
                continue;
            };
            let current = SourceFingerprint::read(source).await?;
            if current.as_ref() != array.fingerprint() {
                tracing::debug!("Config changed: {}", source.display());
                source_removed |= current.is_none();
                self.cache.arrays.invalidate(&key);
                evicted.push(source.to_path_buf());
            }
        }

        if source_removed {
            self.cache.locations.clear();
        }
        Ok(evicted)
    }

    /// Drop every cached source and config array
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl ResolverContext {
    fn default_fragments(&self) -> Vec<ConfigFragment> {
        match &self.options.default_fragments {
            Some(fragments) => fragments.clone(),
            None => defaults::default_fragments(&self.options.builtin_rules),
        }
    }

    /// Assemble and validate the full fragment sequence for one source
    async fn build_config_array(&self, located: &LocatedSource) -> Result<ConfigArray> {
        let options = &self.options;
        let base_path = &located.base_path;

        let mut builder = ConfigArray::builder(base_path)
            .defaults(self.default_fragments())
            .schema(self.schema.clone());
        let mut fragments = options.base_config.clone();
        let base_count = fragments.len();

        if let Some(path) = &located.path {
            let loaded = self.loader.load(path).await?;
            if loaded.is_empty() {
                tracing::warn!("Config file is empty: {}", path.display());
                builder = builder.warning(ConfigWarning::EmptyConfig { path: path.clone() });
            }
            fragments.extend(ConfigFragment::sequence_from_value(&loaded.value)?);
            builder = builder.source(path.clone(), loaded.fingerprint);
        }

        if !options.ignore_patterns.is_empty() {
            fragments.push(
                self.cwd_ignores(&options.ignore_patterns, base_path)
                    .with_name("lintscope/cli-ignores"),
            );
        }

        if let Some(ignore_file) = &options.ignore_file {
            let ignore_file = self.cwd.join(ignore_file);
            let loaded = IgnoreFileLoader::load(&ignore_file).await;
            match loaded {
                Ok(patterns) => fragments.push(
                    self.cwd_ignores(&patterns, base_path)
                        .with_name("lintscope/ignore-file"),
                ),
                Err(ConfigError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    tracing::warn!("Ignore file not found: {}", ignore_file.display());
                    builder = builder.warning(ConfigWarning::MissingIgnoreFile { path: ignore_file });
                }
                Err(err) => return Err(err),
            }
        }

        fragments.extend(options.override_config.iter().cloned());

        // Caller-supplied base fragments keep their ignores
        if !options.ignore {
            let mut added = fragments.split_off(base_count);
            added.retain(|fragment| !fragment.is_global_ignore());
            for fragment in &mut added {
                fragment.ignores = None;
            }
            fragments.extend(added);
        }

        builder.fragments(fragments).build()
    }

    /// Global ignore fragment for patterns written relative to the cwd
    ///
    /// When the cwd lies inside the base path the patterns are prefixed with
    /// the cwd's relative location; otherwise the fragment is anchored at
    /// the cwd directly.
    fn cwd_ignores(&self, patterns: &[String], base_path: &Path) -> ConfigFragment {
        let Ok(relative) = self.cwd.strip_prefix(base_path) else {
            return ConfigFragment::global_ignores(patterns.iter().cloned())
                .with_base_path(&self.cwd);
        };
        if relative.as_os_str().is_empty() {
            return ConfigFragment::global_ignores(patterns.iter().cloned());
        }

        let prefix = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        ConfigFragment::global_ignores(patterns.iter().map(|pattern| {
            let (negation, body) = match pattern.strip_prefix('!') {
                Some(body) => ("!", body),
                None => ("", pattern.as_str()),
            };
            let body = body.trim_start_matches("./").trim_start_matches('/');
            format!("{negation}{prefix}/{body}")
        }))
    }
}

fn absolute_cwd(cwd: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(cwd).map_err(|err| ConfigError::InvalidPath {
        path: cwd.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(normalize(&absolute))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

/// Lexically remove `.` and `..` segments
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
