//! Rule severities, rule option merging and rule-id resolution

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, KeyPath};
use crate::plugin::Plugin;
use crate::result::Result;
use crate::value::ConfigValue;

/// Namespace of rules that carry no plugin prefix
pub const BUILTIN_NAMESPACE: &str = "@";

/// Largest edit distance for which a "Did you mean" hint is offered
const SUGGESTION_DISTANCE: usize = 2;

/// Rule severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Disable the rule
    Off,
    /// Report without failing
    Warn,
    /// Report and fail
    Error,
}

impl Severity {
    /// Parse `"off" | "warn" | "error"` (any case) or `0 | 1 | 2`
    pub fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) => Self::from_name(s),
            ConfigValue::Number(n) => match n.as_u64()? {
                0 => Some(Severity::Off),
                1 => Some(Severity::Warn),
                2 => Some(Severity::Error),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "off" => Some(Severity::Off),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Off => "off",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    /// Numeric form used in serialized output
    pub fn as_number(&self) -> u8 {
        match self {
            Severity::Off => 0,
            Severity::Warn => 1,
            Severity::Error => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_number())
    }
}

/// A normalized rule setting: severity plus options
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub severity: Severity,
    pub options: Vec<serde_json::Value>,
}

impl RuleEntry {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            options: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.severity != Severity::Off
    }

    /// Normalize a validated rule value
    pub fn from_value(value: &ConfigValue) -> Result<Self> {
        validate_rule_value(value)?;
        let (severity, options) = match value {
            ConfigValue::Array(items) => (&items[0], &items[1..]),
            other => (other, &[][..]),
        };
        Ok(Self {
            severity: Severity::from_value(severity).ok_or_else(severity_error)?,
            options: options.iter().map(ConfigValue::to_json).collect(),
        })
    }
}

/// Serialized as `[severity, ...options]`
impl Serialize for RuleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.options.len() + 1))?;
        seq.serialize_element(&self.severity)?;
        for option in &self.options {
            seq.serialize_element(option)?;
        }
        seq.end()
    }
}

fn severity_error() -> ConfigError {
    ConfigError::schema(r#"Expected severity of "off", 0, "warn", 1, "error", or 2."#)
}

/// Check the shape of one rule value
pub fn validate_rule_value(value: &ConfigValue) -> Result<()> {
    let severity = match value {
        ConfigValue::String(_) | ConfigValue::Number(_) => value,
        ConfigValue::Array(items) => items.first().ok_or_else(severity_error)?,
        _ => return Err(ConfigError::schema("Expected a string, number, or array.")),
    };

    Severity::from_value(severity)
        .map(|_| ())
        .ok_or_else(severity_error)
}

/// Combine two settings for the same rule
///
/// A bare severity over an array keeps the earlier options; an array without
/// options over an array does the same; anything else replaces.
pub fn merge_rule(prior: &ConfigValue, next: &ConfigValue) -> ConfigValue {
    match (prior, next) {
        (ConfigValue::Array(prior_items), ConfigValue::Array(next_items))
            if next_items.len() == 1 =>
        {
            let mut merged = vec![next_items[0].clone()];
            merged.extend(prior_items.iter().skip(1).cloned());
            ConfigValue::Array(merged)
        }
        (ConfigValue::Array(prior_items), next) if !next.is_array() => {
            let mut merged = vec![next.clone()];
            merged.extend(prior_items.iter().skip(1).cloned());
            ConfigValue::Array(merged)
        }
        (_, next) => next.clone(),
    }
}

/// Split a rule-id into plugin namespace and local rule name
///
/// `semi` belongs to the built-in namespace; `react/jsx` and
/// `@scope/plugin/rule` split on the last `/`.
pub fn split_rule_id(rule_id: &str) -> (&str, &str) {
    match rule_id.rfind('/') {
        Some(index) => (&rule_id[..index], &rule_id[index + 1..]),
        None => (BUILTIN_NAMESPACE, rule_id),
    }
}

/// Verify that an enabled rule exists in the plugin table
pub fn resolve_rule(rule_id: &str, plugins: &IndexMap<String, Arc<Plugin>>) -> Result<()> {
    let (namespace, name) = split_rule_id(rule_id);
    let path = KeyPath::from_segments([rule_id]);

    let Some(plugin) = plugins.get(namespace) else {
        return Err(ConfigError::plugin_resolution(
            path,
            format!(r#"Could not find plugin "{namespace}"."#),
        ));
    };

    if plugin.rules.contains_key(name) {
        return Ok(());
    }

    let mut message = format!(r#"Could not find "{name}" in plugin "{namespace}"."#);
    if let Some(suggestion) = suggest_rule(name, plugin) {
        let qualified = if namespace == BUILTIN_NAMESPACE {
            suggestion.to_string()
        } else {
            format!("{namespace}/{suggestion}")
        };
        message.push_str(&format!(r#" Did you mean "{qualified}"?"#));
    }

    Err(ConfigError::plugin_resolution(path, message))
}

/// Closest rule name in the same plugin, if any is close enough
fn suggest_rule<'a>(name: &str, plugin: &'a Plugin) -> Option<&'a str> {
    plugin
        .rules
        .keys()
        .map(|candidate| (edit_distance(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.as_str())
}

/// Calculate edit distance between two strings (Levenshtein distance)
fn edit_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = std::cmp::min(
                std::cmp::min(matrix[i - 1][j] + 1, matrix[i][j - 1] + 1),
                matrix[i - 1][j - 1] + cost,
            );
        }
    }

    matrix[len1][len2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: serde_json::Value) -> ConfigValue {
        ConfigValue::from(v)
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::from_value(&value(json!("ERROR"))), Some(Severity::Error));
        assert_eq!(Severity::from_value(&value(json!(1))), Some(Severity::Warn));
        assert_eq!(Severity::from_value(&value(json!(3))), None);
        assert_eq!(Severity::from_value(&value(json!(true))), None);
    }

    #[test]
    fn test_merge_laws() {
        // prior array + bare severity keeps options
        assert_eq!(
            merge_rule(&value(json!(["error", "always"])), &value(json!("warn"))),
            value(json!(["warn", "always"]))
        );
        // prior bare severity is replaced verbatim
        assert_eq!(
            merge_rule(&value(json!("warn")), &value(json!(["error", "never"]))),
            value(json!(["error", "never"]))
        );
        // both arrays, next without options
        assert_eq!(
            merge_rule(&value(json!([2, {"max": 3}])), &value(json!([1]))),
            value(json!([1, {"max": 3}]))
        );
        // both arrays, next with options wins entirely
        assert_eq!(
            merge_rule(&value(json!([2, "a", "b"])), &value(json!([1, "c"]))),
            value(json!([1, "c"]))
        );
    }

    #[test]
    fn test_validate_rule_value() {
        assert!(validate_rule_value(&value(json!("off"))).is_ok());
        assert!(validate_rule_value(&value(json!([2, "x"]))).is_ok());
        assert_eq!(
            validate_rule_value(&value(json!({}))).unwrap_err().to_string(),
            "Expected a string, number, or array."
        );
        assert_eq!(
            validate_rule_value(&value(json!([]))).unwrap_err().to_string(),
            r#"Expected severity of "off", 0, "warn", 1, "error", or 2."#
        );
    }

    #[test]
    fn test_split_rule_id() {
        assert_eq!(split_rule_id("semi"), ("@", "semi"));
        assert_eq!(split_rule_id("react/jsx-key"), ("react", "jsx-key"));
        assert_eq!(split_rule_id("@scope/plugin/rule"), ("@scope/plugin", "rule"));
    }

    #[test]
    fn test_resolve_rule_suggestion() {
        let mut plugins = IndexMap::new();
        plugins.insert(
            "p".to_string(),
            Arc::new(Plugin::new("p").with_rules(["no-foo", "no-bar-baz"])),
        );

        assert!(resolve_rule("p/no-foo", &plugins).is_ok());
        assert_eq!(
            resolve_rule("p/no-fo", &plugins).unwrap_err().to_string(),
            r#"Key "p/no-fo": Could not find "no-fo" in plugin "p". Did you mean "p/no-foo"?"#
        );
        assert_eq!(
            resolve_rule("q/x", &plugins).unwrap_err().to_string(),
            r#"Key "q/x": Could not find plugin "q"."#
        );
        assert_eq!(
            resolve_rule("p/completely-different", &plugins)
                .unwrap_err()
                .to_string(),
            r#"Key "p/completely-different": Could not find "completely-different" in plugin "p"."#
        );
    }

    #[test]
    fn test_rule_entry_normalization() {
        let entry = RuleEntry::from_value(&value(json!(["Warn", {"allow": ["x"]}]))).unwrap();
        assert_eq!(entry.severity, Severity::Warn);
        assert_eq!(entry.options, vec![json!({"allow": ["x"]})]);
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!([1, {"allow": ["x"]}]));
    }
}
