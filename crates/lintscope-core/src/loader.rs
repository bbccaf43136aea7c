//! Reading configuration sources from disk

use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{ConfigError, KeyPath};
use crate::plugin::PluginRegistry;
use crate::result::Result;
use crate::value::ConfigValue;

/// File state captured when a source is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl SourceFingerprint {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }

    /// Current fingerprint of a file, `None` when it no longer exists
    pub async fn read(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(Some(Self::from_metadata(&metadata))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ConfigError::io_error(path, err)),
        }
    }
}

/// Raw content of one configuration source
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub value: ConfigValue,
    pub fingerprint: Option<SourceFingerprint>,
}

impl LoadedSource {
    /// Empty file, `null`, `[]` or `{}`
    pub fn is_empty(&self) -> bool {
        self.value.is_empty_container()
    }
}

/// Loads a configuration source into a raw value
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedSource>;
}

/// Loads `.json`, `.jsonc`, `.yaml`/`.yml` and `.toml` files
///
/// Files cannot hold plugin objects, so string entries under `plugins` are
/// looked up by name in a [`PluginRegistry`].
#[derive(Debug, Clone, Default)]
pub struct FileSourceLoader {
    plugins: PluginRegistry,
}

impl FileSourceLoader {
    pub fn new(plugins: PluginRegistry) -> Self {
        Self { plugins }
    }

    /// Parse file content according to the file extension
    pub fn parse_content(path: &Path, content: &str) -> Result<serde_json::Value> {
        if content.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        let ext = path.extension().and_then(|e| e.to_str());
        let parsed: std::result::Result<serde_json::Value, String> = match ext {
            Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
            Some("jsonc") | Some("json5") => json5::from_str(content).map_err(|e| e.to_string()),
            Some("yaml") | Some("yml") => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Some("toml") => toml::from_str(content).map_err(|e| e.to_string()),
            _ => Err(
                "Unsupported file extension (expected .json, .jsonc, .yaml, .yml, or .toml)"
                    .to_string(),
            ),
        };

        parsed.map_err(|message| ConfigError::source_load(path, message))
    }

    /// Replace plugin names with registered plugin objects
    pub fn resolve_plugins(&self, value: ConfigValue) -> Result<ConfigValue> {
        match value {
            ConfigValue::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    self.resolve_fragment_plugins(item).map_err(|err| match err {
                        ConfigError::PluginResolution { path, message } => {
                            ConfigError::PluginResolution {
                                path,
                                message: format!("{message} (config at index {index})"),
                            }
                        }
                        other => other,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(ConfigValue::Array),
            other => self.resolve_fragment_plugins(other),
        }
    }

    fn resolve_fragment_plugins(&self, fragment: ConfigValue) -> Result<ConfigValue> {
        let ConfigValue::Object(mut map) = fragment else {
            return Ok(fragment);
        };

        if let Some(ConfigValue::Object(plugins)) = map.get_mut("plugins") {
            for (namespace, entry) in plugins.iter_mut() {
                let ConfigValue::String(name) = entry else {
                    continue;
                };
                let plugin = self.plugins.get(name).ok_or_else(|| {
                    ConfigError::plugin_resolution(
                        KeyPath::from_segments(["plugins", namespace.as_str()]),
                        format!(r#"Could not find plugin "{name}"."#),
                    )
                })?;
                *entry = ConfigValue::Plugin(plugin.clone());
            }
        }

        Ok(ConfigValue::Object(map))
    }
}

#[async_trait]
impl SourceLoader for FileSourceLoader {
    async fn load(&self, path: &Path) -> Result<LoadedSource> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ConfigError::io_error(path, err))?;
        let fingerprint = SourceFingerprint::read(path).await?;

        let value = self.resolve_plugins(Self::parse_content(path, &content)?.into())?;
        tracing::debug!("Loaded config: {}", path.display());

        Ok(LoadedSource {
            path: path.to_path_buf(),
            value,
            fingerprint,
        })
    }
}

/// Reads `.gitignore`-style ignore files
pub struct IgnoreFileLoader;

impl IgnoreFileLoader {
    /// Load and convert every pattern of an ignore file
    pub async fn load(path: &Path) -> Result<Vec<String>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ConfigError::io_error(path, err))?;
        Ok(Self::parse(&content))
    }

    /// Convert ignore file content, skipping blank lines and `#` comments
    pub fn parse(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            // A bare `!` or `/` names nothing
            .filter(|line| !line.trim_start_matches('!').trim_matches('/').is_empty())
            .map(Self::convert_pattern)
            .collect()
    }

    /// Convert one `.gitignore` pattern
    ///
    /// Names without an inner `/` match at any depth and gain a `**/`
    /// prefix; a leading `/` anchors and is dropped; `x/**` is narrowed to
    /// the contents of `x`.
    pub fn convert_pattern(pattern: &str) -> String {
        let (negation, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => ("!", rest),
            None => ("", pattern),
        };
        let pattern = pattern.trim_end();

        if matches!(pattern, "" | "**" | "/**" | "**/") {
            return format!("{negation}{pattern}");
        }

        let first_slash = pattern.find('/');
        let anywhere = match first_slash {
            None => true,
            Some(index) => index == pattern.len() - 1,
        };
        let body = if first_slash == Some(0) {
            &pattern[1..]
        } else {
            pattern
        };
        let prefix = if anywhere { "**/" } else { "" };
        let suffix = if pattern.ends_with("/**") { "/*" } else { "" };

        format!("{negation}{prefix}{body}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Plugin;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_content_by_extension() {
        let json = FileSourceLoader::parse_content(Path::new("c.json"), r#"{"rules": {}}"#);
        assert_eq!(json.unwrap(), json!({"rules": {}}));

        let jsonc = FileSourceLoader::parse_content(
            Path::new("c.jsonc"),
            "// comment\n[{\"rules\": {\"semi\": \"warn\",},},]",
        );
        assert_eq!(jsonc.unwrap(), json!([{"rules": {"semi": "warn"}}]));

        let yaml = FileSourceLoader::parse_content(Path::new("c.yaml"), "- rules:\n    semi: warn\n");
        assert_eq!(yaml.unwrap(), json!([{"rules": {"semi": "warn"}}]));

        let toml = FileSourceLoader::parse_content(Path::new("c.toml"), "[rules]\nsemi = \"error\"\n");
        assert_eq!(toml.unwrap(), json!({"rules": {"semi": "error"}}));

        let empty = FileSourceLoader::parse_content(Path::new("c.json"), "  \n");
        assert_eq!(empty.unwrap(), serde_json::Value::Null);

        let err = FileSourceLoader::parse_content(Path::new("c.ini"), "x=1").unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    #[test]
    fn test_plugin_names_resolve_through_registry() {
        let markdown = Arc::new(Plugin::new("markdown"));
        let loader =
            FileSourceLoader::new(PluginRegistry::new().with("markdown", markdown.clone()));

        let value = loader
            .resolve_plugins(ConfigValue::from(json!([{"plugins": {"md": "markdown"}}])))
            .unwrap();
        let plugins = value.as_array().unwrap()[0].as_object().unwrap()["plugins"].clone();
        assert_eq!(
            plugins,
            ConfigValue::object([("md", ConfigValue::from(markdown))])
        );

        let err = loader
            .resolve_plugins(ConfigValue::from(json!({"plugins": {"x": "missing"}})))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Key "plugins": Key "x": Could not find plugin "missing"."#
        );
    }

    #[tokio::test]
    async fn test_load_captures_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lintscope.config.json");
        std::fs::write(&path, r#"{"rules": {"semi": "error"}}"#).unwrap();

        let source = FileSourceLoader::default().load(&path).await.unwrap();
        assert!(!source.is_empty());
        assert_eq!(source.fingerprint.unwrap().len, 28);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileSourceLoader::default()
            .load(&temp_dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_convert_ignore_patterns() {
        assert_eq!(IgnoreFileLoader::convert_pattern("node_modules"), "**/node_modules");
        assert_eq!(IgnoreFileLoader::convert_pattern("dist/"), "**/dist/");
        assert_eq!(IgnoreFileLoader::convert_pattern("/build"), "build");
        assert_eq!(IgnoreFileLoader::convert_pattern("src/gen/*.js"), "src/gen/*.js");
        assert_eq!(IgnoreFileLoader::convert_pattern("!keep.js"), "!**/keep.js");
        assert_eq!(IgnoreFileLoader::convert_pattern("out/**"), "out/**/*");
        assert_eq!(IgnoreFileLoader::convert_pattern("**"), "**");

        assert_eq!(
            IgnoreFileLoader::parse("# generated\n\ncoverage/\n!coverage/keep/\n"),
            vec!["**/coverage/", "!coverage/keep/"]
        );
    }

    #[test]
    fn test_ignore_file_skips_lines_without_a_name() {
        assert_eq!(
            IgnoreFileLoader::parse("dist/
!
/
//
!/
"),
            vec!["**/dist/"]
        );
    }
}
