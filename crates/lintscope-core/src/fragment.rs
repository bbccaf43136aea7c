//! Configuration fragments
//!
//! A fragment is one partial configuration object: optional `files` and
//! `ignores` selectors plus the remaining top-level keys, still unvalidated.

use indexmap::IndexMap;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::result::{Result, ResultExt};
use crate::value::ConfigValue;

/// Keys handled by the fragment itself rather than the schema
const SELECTOR_KEYS: &[&str] = &["name", "basePath", "files", "ignores"];

/// One entry of a fragment's `files` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesEntry {
    /// Matches when the pattern matches
    Pattern(String),
    /// Matches only when every pattern matches
    All(Vec<String>),
}

impl FilesEntry {
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        let patterns: &[String] = match self {
            FilesEntry::Pattern(pattern) => std::slice::from_ref(pattern),
            FilesEntry::All(patterns) => patterns,
        };
        patterns.iter().map(String::as_str)
    }
}

impl From<&str> for FilesEntry {
    fn from(pattern: &str) -> Self {
        FilesEntry::Pattern(pattern.to_string())
    }
}

impl From<String> for FilesEntry {
    fn from(pattern: String) -> Self {
        FilesEntry::Pattern(pattern)
    }
}

/// A partial configuration object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFragment {
    pub name: Option<String>,
    /// Directory the fragment's patterns are relative to; defaults to the
    /// base path of the sequence it belongs to
    pub base_path: Option<PathBuf>,
    pub files: Option<Vec<FilesEntry>>,
    pub ignores: Option<Vec<String>>,
    /// Remaining top-level keys in declaration order
    pub entries: IndexMap<String, ConfigValue>,
}

impl ConfigFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A fragment holding nothing but ignore patterns
    pub fn global_ignores<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_ignores(patterns)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_files<I, E>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<FilesEntry>,
    {
        self.files = Some(entries.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_ignores<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignores = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Set a top-level key
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Whether the fragment only carries `ignores` (and optionally a name)
    ///
    /// Such fragments feed the global ignore cascade; `ignores` on any other
    /// fragment only narrows that fragment.
    pub fn is_global_ignore(&self) -> bool {
        self.ignores.is_some() && self.files.is_none() && self.entries.is_empty()
    }

    /// Label used in log output
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }

    /// Build a fragment from a raw object value
    pub fn from_value(value: &ConfigValue) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Err(ConfigError::schema(format!(
                "Expected a configuration object, found {}.",
                value.type_name()
            )));
        };

        let mut fragment = ConfigFragment::new();

        if let Some(name) = map.get("name") {
            let name = name
                .as_str()
                .ok_or_else(|| ConfigError::schema_at("name", "Expected a string."))?;
            fragment.name = Some(name.to_string());
        }

        if let Some(base_path) = map.get("basePath") {
            let base_path = base_path
                .as_str()
                .ok_or_else(|| ConfigError::schema_at("basePath", "Expected a string."))?;
            fragment.base_path = Some(PathBuf::from(base_path));
        }

        if let Some(files) = map.get("files") {
            fragment.files = Some(parse_files(files).under_key("files")?);
        }

        if let Some(ignores) = map.get("ignores") {
            fragment.ignores = Some(parse_ignores(ignores).under_key("ignores")?);
        }

        for (key, value) in map {
            if !SELECTOR_KEYS.contains(&key.as_str()) {
                fragment.entries.insert(key.clone(), value.clone());
            }
        }

        Ok(fragment)
    }

    /// Build a fragment sequence from a source's top-level value
    ///
    /// A source may hold one fragment object, an array of them, or nothing.
    pub fn sequence_from_value(value: &ConfigValue) -> Result<Vec<Self>> {
        match value {
            ConfigValue::Null => Ok(Vec::new()),
            ConfigValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    Self::from_value(item).map_err(|err| match err {
                        ConfigError::Schema { path, message } if path.is_empty() => {
                            ConfigError::schema(format!(
                                "Config at index {index}: {message}"
                            ))
                        }
                        other => other,
                    })
                })
                .collect(),
            ConfigValue::Object(map) if map.is_empty() => Ok(Vec::new()),
            other => Ok(vec![Self::from_value(other)?]),
        }
    }
}

fn string_list(value: &ConfigValue) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn parse_files(value: &ConfigValue) -> Result<Vec<FilesEntry>> {
    let items = value
        .as_array()
        .ok_or_else(|| ConfigError::schema("Expected value to be an array."))?;
    if items.is_empty() {
        return Err(ConfigError::schema("Expected value to be a non-empty array."));
    }

    items
        .iter()
        .map(|item| match item {
            ConfigValue::String(pattern) => Ok(FilesEntry::Pattern(pattern.clone())),
            ConfigValue::Array(_) => string_list(item).map(FilesEntry::All).ok_or_else(|| {
                ConfigError::schema("Expected array to only contain strings.")
            }),
            _ => Err(ConfigError::schema(
                "Items must be a string or an array of strings.",
            )),
        })
        .collect()
}

fn parse_ignores(value: &ConfigValue) -> Result<Vec<String>> {
    string_list(value).ok_or_else(|| ConfigError::schema("Expected array to only contain strings."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragment_from_value() {
        let fragment = ConfigFragment::from_value(&ConfigValue::from(json!({
            "name": "js",
            "files": ["**/*.js", ["src/**", "**/*.ts"]],
            "ignores": ["dist/"],
            "rules": {"semi": "error"}
        })))
        .unwrap();

        assert_eq!(fragment.name.as_deref(), Some("js"));
        assert_eq!(
            fragment.files,
            Some(vec![
                FilesEntry::Pattern("**/*.js".to_string()),
                FilesEntry::All(vec!["src/**".to_string(), "**/*.ts".to_string()]),
            ])
        );
        assert_eq!(fragment.ignores, Some(vec!["dist/".to_string()]));
        assert_eq!(fragment.entries.keys().collect::<Vec<_>>(), vec!["rules"]);
        assert!(!fragment.is_global_ignore());
    }

    #[test]
    fn test_global_ignore_detection() {
        assert!(ConfigFragment::global_ignores(["dist/"]).is_global_ignore());
        assert!(
            ConfigFragment::global_ignores(["dist/"])
                .with_name("ignores")
                .is_global_ignore()
        );
        assert!(
            !ConfigFragment::global_ignores(["dist/"])
                .with("rules", ConfigValue::from(json!({})))
                .is_global_ignore()
        );
        assert!(!ConfigFragment::new().is_global_ignore());
    }

    #[test]
    fn test_invalid_selectors() {
        let err = ConfigFragment::from_value(&ConfigValue::from(json!({"files": []}))).unwrap_err();
        assert_eq!(err.to_string(), r#"Key "files": Expected value to be a non-empty array."#);

        let err =
            ConfigFragment::from_value(&ConfigValue::from(json!({"ignores": [1]}))).unwrap_err();
        assert_eq!(err.to_string(), r#"Key "ignores": Expected array to only contain strings."#);
    }

    #[test]
    fn test_sequence_from_value() {
        assert!(ConfigFragment::sequence_from_value(&ConfigValue::Null).unwrap().is_empty());
        assert!(
            ConfigFragment::sequence_from_value(&ConfigValue::from(json!({})))
                .unwrap()
                .is_empty()
        );
        let sequence =
            ConfigFragment::sequence_from_value(&ConfigValue::from(json!([{"rules": {}}, {}])))
                .unwrap();
        assert_eq!(sequence.len(), 2);

        let err = ConfigFragment::sequence_from_value(&ConfigValue::from(json!([{}, 3])))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config at index 1: Expected a configuration object, found number."
        );
    }
}
