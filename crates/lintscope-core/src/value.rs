//! Raw configuration values
//!
//! Fragments hold their top-level values as [`ConfigValue`] trees until the
//! schema validates them. The tree is JSON-shaped, plus opaque handles for
//! the objects that only exist in memory (plugins, processors, parsers).
//! Handles compare by identity, never by content.

use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::sync::Arc;

use crate::plugin::{Parser, Plugin, Processor};

/// A raw, unvalidated configuration value
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ConfigValue>),
    Object(IndexMap<String, ConfigValue>),
    Plugin(Arc<Plugin>),
    Processor(Arc<Processor>),
    Parser(Arc<Parser>),
}

impl ConfigValue {
    /// Build an object value from key/value pairs, keeping their order
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigValue)>,
        K: Into<String>,
    {
        ConfigValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Human readable name of the value's shape, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
            ConfigValue::Object(_) => "object",
            ConfigValue::Plugin(_) => "plugin",
            ConfigValue::Processor(_) => "processor",
            ConfigValue::Parser(_) => "parser",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ConfigValue::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    /// Whether this is an empty array, empty object or null
    pub fn is_empty_container(&self) -> bool {
        match self {
            ConfigValue::Null => true,
            ConfigValue::Array(items) => items.is_empty(),
            ConfigValue::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Convert to plain JSON
    ///
    /// Object handles become their declared name (or `"[plugin]"` style
    /// placeholders when anonymous) so that settings and rule options can be
    /// serialized for inspection.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Number(n) => Value::Number(n.clone()),
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ConfigValue::Plugin(plugin) => Value::String(
                plugin
                    .meta
                    .id()
                    .unwrap_or_else(|| "[plugin]".to_string()),
            ),
            ConfigValue::Processor(processor) => Value::String(
                processor
                    .meta
                    .id()
                    .unwrap_or_else(|| "[processor]".to_string()),
            ),
            ConfigValue::Parser(parser) => Value::String(
                parser.meta.id().unwrap_or_else(|| "[parser]".to_string()),
            ),
        }
    }
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConfigValue::Null, ConfigValue::Null) => true,
            (ConfigValue::Bool(a), ConfigValue::Bool(b)) => a == b,
            (ConfigValue::Number(a), ConfigValue::Number(b)) => a == b,
            (ConfigValue::String(a), ConfigValue::String(b)) => a == b,
            (ConfigValue::Array(a), ConfigValue::Array(b)) => a == b,
            (ConfigValue::Object(a), ConfigValue::Object(b)) => a == b,
            (ConfigValue::Plugin(a), ConfigValue::Plugin(b)) => Arc::ptr_eq(a, b),
            (ConfigValue::Processor(a), ConfigValue::Processor(b)) => Arc::ptr_eq(a, b),
            (ConfigValue::Parser(a), ConfigValue::Parser(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => ConfigValue::Number(n),
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => ConfigValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ConfigValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value.into())
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::Array(value)
    }
}

impl From<Arc<Plugin>> for ConfigValue {
    fn from(value: Arc<Plugin>) -> Self {
        ConfigValue::Plugin(value)
    }
}

impl From<Arc<Processor>> for ConfigValue {
    fn from(value: Arc<Processor>) -> Self {
        ConfigValue::Processor(value)
    }
}

impl From<Arc<Parser>> for ConfigValue {
    fn from(value: Arc<Parser>) -> Self {
        ConfigValue::Parser(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_key_order() {
        let value = ConfigValue::from(json!({"zeta": 1, "alpha": [true, null]}));
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(value.to_json(), json!({"zeta": 1, "alpha": [true, null]}));
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let a = Arc::new(Plugin::new("a"));
        let b = Arc::new(Plugin::new("a"));

        assert_eq!(ConfigValue::from(a.clone()), ConfigValue::from(a.clone()));
        assert_ne!(ConfigValue::from(a), ConfigValue::from(b));
    }

    #[test]
    fn test_empty_containers() {
        assert!(ConfigValue::Null.is_empty_container());
        assert!(ConfigValue::from(json!([])).is_empty_container());
        assert!(ConfigValue::from(json!({})).is_empty_container());
        assert!(!ConfigValue::from(json!({"rules": {}})).is_empty_container());
    }
}
