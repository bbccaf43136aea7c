//! Per-key merge and validation rules for fragment values
//!
//! Every top-level key a fragment may carry is declared here, together with
//! how two values for that key combine and how a single value is checked.
//! `languageOptions` and `linterOptions` are nested object schemas whose
//! own keys follow the same rules.

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::error::ConfigError;
use crate::fragment::ConfigFragment;
use crate::result::{Result, ResultExt};
use crate::rules::{merge_rule, validate_rule_value};
use crate::value::ConfigValue;

static PLUGIN_MEMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[a-z0-9\-_$]+/[a-z0-9\-_$]+").unwrap());

/// Top-level keys of the previous configuration format
pub const LEGACY_KEYS: &[&str] = &[
    "env",
    "extends",
    "globals",
    "ignorePatterns",
    "noInlineConfig",
    "overrides",
    "parser",
    "parserOptions",
    "reportUnusedDisableDirectives",
    "root",
];

const LEGACY_FORMAT_MESSAGE: &str =
    "This appears to be in an older configuration format rather than the flat format.";

const GLOBAL_ACCESS_VALUES: &[&str] = &["readonly", "writable", "writeable", "off"];

pub type Validator = fn(&ConfigValue) -> Result<()>;
pub type MergeFn = fn(&ConfigValue, &ConfigValue) -> Result<ConfigValue>;

/// How two values for the same key combine; the second value is the later one
#[derive(Clone, Copy)]
pub enum MergeStrategy {
    /// The later value wins
    Replace,
    /// Key union of two objects, later wins per key, nested objects are
    /// unioned one level deep
    Assign,
    Custom(MergeFn),
}

impl MergeStrategy {
    pub fn apply(&self, prior: &ConfigValue, next: &ConfigValue) -> Result<ConfigValue> {
        match self {
            MergeStrategy::Replace => Ok(next.clone()),
            MergeStrategy::Assign => Ok(assign(prior, next, true)),
            MergeStrategy::Custom(merge) => merge(prior, next),
        }
    }
}

impl fmt::Debug for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Replace => f.write_str("Replace"),
            MergeStrategy::Assign => f.write_str("Assign"),
            MergeStrategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

fn assign(prior: &ConfigValue, next: &ConfigValue, recurse: bool) -> ConfigValue {
    let (Some(prior_map), Some(next_map)) = (prior.as_object(), next.as_object()) else {
        return next.clone();
    };

    let mut merged = prior_map.clone();
    for (key, value) in next_map {
        let combined = match merged.get(key) {
            Some(existing) if recurse && existing.is_object() && value.is_object() => {
                assign(existing, value, false)
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    ConfigValue::Object(merged)
}

/// Schema for one key
#[derive(Debug)]
pub enum FieldSchema {
    Value {
        merge: MergeStrategy,
        validate: Validator,
    },
    Object(ObjectSchema),
}

impl FieldSchema {
    pub fn value(merge: MergeStrategy, validate: Validator) -> Self {
        FieldSchema::Value { merge, validate }
    }

    fn validate(&self, value: &ConfigValue) -> Result<()> {
        match self {
            FieldSchema::Value { validate, .. } => validate(value),
            FieldSchema::Object(schema) => {
                let map = value
                    .as_object()
                    .ok_or_else(|| ConfigError::schema("Expected an object."))?;
                schema.validate(map)
            }
        }
    }

    fn merge(&self, prior: &ConfigValue, next: &ConfigValue) -> Result<ConfigValue> {
        match self {
            FieldSchema::Value { merge, .. } => merge.apply(prior, next),
            FieldSchema::Object(schema) => match (prior.as_object(), next.as_object()) {
                (Some(prior_map), Some(next_map)) => {
                    Ok(ConfigValue::Object(schema.merge(prior_map, next_map)?))
                }
                _ => Ok(next.clone()),
            },
        }
    }
}

/// An ordered set of key schemas
#[derive(Debug, Default)]
pub struct ObjectSchema {
    fields: IndexMap<String, FieldSchema>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.insert(key.into(), schema);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn validate(&self, map: &IndexMap<String, ConfigValue>) -> Result<()> {
        for (key, value) in map {
            let schema = self
                .fields
                .get(key)
                .ok_or_else(|| ConfigError::schema(format!(r#"Unexpected key "{key}" found."#)))?;
            schema.validate(value).under_key(key)?;
        }
        Ok(())
    }

    pub fn merge(
        &self,
        prior: &IndexMap<String, ConfigValue>,
        next: &IndexMap<String, ConfigValue>,
    ) -> Result<IndexMap<String, ConfigValue>> {
        let mut merged = prior.clone();
        for (key, value) in next {
            let combined = match (merged.get(key), self.fields.get(key)) {
                (Some(existing), Some(schema)) => schema.merge(existing, value).under_key(key)?,
                _ => value.clone(),
            };
            merged.insert(key.clone(), combined);
        }
        Ok(merged)
    }
}

/// The set of keys a fragment may carry
#[derive(Debug)]
pub struct SchemaRegistry {
    root: ObjectSchema,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Registry for the flat configuration format
    pub fn new() -> Self {
        let language_options = ObjectSchema::new()
            .field(
                "ecmaVersion",
                FieldSchema::value(MergeStrategy::Replace, validate_ecma_version),
            )
            .field(
                "sourceType",
                FieldSchema::value(MergeStrategy::Replace, validate_source_type),
            )
            .field(
                "globals",
                FieldSchema::value(MergeStrategy::Assign, validate_globals),
            )
            .field(
                "parser",
                FieldSchema::value(MergeStrategy::Replace, validate_parser),
            )
            .field(
                "parserOptions",
                FieldSchema::value(MergeStrategy::Assign, validate_object),
            );

        let linter_options = ObjectSchema::new()
            .field(
                "noInlineConfig",
                FieldSchema::value(MergeStrategy::Replace, validate_boolean),
            )
            .field(
                "reportUnusedDisableDirectives",
                FieldSchema::value(MergeStrategy::Replace, validate_report_unused),
            );

        let root = ObjectSchema::new()
            .field(
                "settings",
                FieldSchema::value(MergeStrategy::Assign, validate_object),
            )
            .field("linterOptions", FieldSchema::Object(linter_options))
            .field("languageOptions", FieldSchema::Object(language_options))
            .field(
                "processor",
                FieldSchema::value(MergeStrategy::Replace, validate_processor),
            )
            .field(
                "plugins",
                FieldSchema::value(MergeStrategy::Custom(merge_plugins), validate_plugins),
            )
            .field(
                "rules",
                FieldSchema::value(MergeStrategy::Custom(merge_rules), validate_rules),
            );

        Self { root }
    }

    /// Declare an additional top-level key
    pub fn with_field(mut self, key: impl Into<String>, schema: FieldSchema) -> Self {
        self.root = self.root.field(key, schema);
        self
    }

    pub fn root(&self) -> &ObjectSchema {
        &self.root
    }

    /// Check every key of a fragment
    pub fn validate_fragment(&self, fragment: &ConfigFragment) -> Result<()> {
        for key in fragment.entries.keys() {
            if LEGACY_KEYS.contains(&key.as_str()) && self.root.get(key).is_none() {
                return Err(ConfigError::schema_at(key, LEGACY_FORMAT_MESSAGE));
            }
        }
        self.root.validate(&fragment.entries)
    }

    /// Fold `next` over `prior`
    pub fn merge_entries(
        &self,
        prior: &IndexMap<String, ConfigValue>,
        next: &IndexMap<String, ConfigValue>,
    ) -> Result<IndexMap<String, ConfigValue>> {
        self.root.merge(prior, next)
    }
}

fn validate_object(value: &ConfigValue) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ConfigError::schema("Expected an object."))
    }
}

fn validate_boolean(value: &ConfigValue) -> Result<()> {
    match value {
        ConfigValue::Bool(_) => Ok(()),
        _ => Err(ConfigError::schema("Expected a boolean.")),
    }
}

fn validate_ecma_version(value: &ConfigValue) -> Result<()> {
    match value {
        ConfigValue::Number(n) if n.as_u64().is_some() => Ok(()),
        ConfigValue::String(s) if s == "latest" => Ok(()),
        _ => Err(ConfigError::schema(r#"Expected a number or "latest"."#)),
    }
}

fn validate_source_type(value: &ConfigValue) -> Result<()> {
    match value.as_str() {
        Some("script" | "module" | "commonjs") => Ok(()),
        _ => Err(ConfigError::schema(
            r#"Expected "script", "module", or "commonjs"."#,
        )),
    }
}

fn validate_globals(value: &ConfigValue) -> Result<()> {
    let map = value
        .as_object()
        .ok_or_else(|| ConfigError::schema("Expected an object."))?;

    for (name, access) in map {
        if name.trim() != name {
            return Err(ConfigError::schema(format!(
                r#"Global "{name}" has leading or trailing whitespace."#
            )));
        }

        let valid = match access {
            ConfigValue::Bool(_) => true,
            ConfigValue::String(s) => GLOBAL_ACCESS_VALUES.contains(&s.as_str()),
            _ => false,
        };
        if !valid {
            return Err(
                ConfigError::schema(r#"Expected "readonly", "writable", or "off"."#).under(name),
            );
        }
    }
    Ok(())
}

fn validate_plugin_member(name: &str) -> Result<()> {
    if PLUGIN_MEMBER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::schema(
            r#"Expected string in the form "pluginName/objectName"."#,
        ))
    }
}

fn validate_parser(value: &ConfigValue) -> Result<()> {
    match value {
        ConfigValue::String(name) => validate_plugin_member(name),
        ConfigValue::Parser(parser) if parser.has_parse() => Ok(()),
        ConfigValue::Parser(_) | ConfigValue::Object(_) => Err(ConfigError::schema(
            "Expected object to have a parse() method.",
        )),
        _ => Err(ConfigError::schema("Expected an object or string.")),
    }
}

fn validate_processor(value: &ConfigValue) -> Result<()> {
    match value {
        ConfigValue::String(name) => validate_plugin_member(name),
        ConfigValue::Processor(processor)
            if processor.has_preprocess() && processor.has_postprocess() =>
        {
            Ok(())
        }
        ConfigValue::Processor(_) | ConfigValue::Object(_) => Err(ConfigError::schema(
            "Object must have a preprocess() and a postprocess() method.",
        )),
        _ => Err(ConfigError::schema("Expected an object or a string.")),
    }
}

fn validate_report_unused(value: &ConfigValue) -> Result<()> {
    match value {
        ConfigValue::Bool(_) => Ok(()),
        ConfigValue::String(s) if matches!(s.as_str(), "off" | "warn" | "error") => Ok(()),
        _ => Err(ConfigError::schema(
            r#"Value must be "off", "warn", "error", or a boolean."#,
        )),
    }
}

fn validate_plugins(value: &ConfigValue) -> Result<()> {
    if value.is_array() {
        return Err(ConfigError::schema(LEGACY_FORMAT_MESSAGE));
    }
    let map = value
        .as_object()
        .ok_or_else(|| ConfigError::schema("Expected an object."))?;

    for (namespace, plugin) in map {
        match plugin {
            ConfigValue::Plugin(_) => {}
            ConfigValue::Object(_) => {
                return Err(
                    ConfigError::schema("Expected a registered plugin object.").under(namespace),
                );
            }
            _ => {
                return Err(ConfigError::schema("Expected an object.").under(namespace));
            }
        }
    }
    Ok(())
}

fn validate_rules(value: &ConfigValue) -> Result<()> {
    let map = value
        .as_object()
        .ok_or_else(|| ConfigError::schema("Expected an object."))?;

    for (rule_id, setting) in map {
        validate_rule_value(setting).under_key(rule_id)?;
    }
    Ok(())
}

/// Union of two plugin tables; a namespace may only be bound to one object
fn merge_plugins(prior: &ConfigValue, next: &ConfigValue) -> Result<ConfigValue> {
    let (Some(prior_map), Some(next_map)) = (prior.as_object(), next.as_object()) else {
        return Ok(next.clone());
    };

    let mut merged = prior_map.clone();
    for (namespace, plugin) in next_map {
        if let Some(existing) = merged.get(namespace)
            && existing != plugin
        {
            return Err(ConfigError::plugin_resolution(
                Default::default(),
                format!(r#"Cannot redefine plugin "{namespace}"."#),
            ));
        }
        merged.insert(namespace.clone(), plugin.clone());
    }
    Ok(ConfigValue::Object(merged))
}

fn merge_rules(prior: &ConfigValue, next: &ConfigValue) -> Result<ConfigValue> {
    let (Some(prior_map), Some(next_map)) = (prior.as_object(), next.as_object()) else {
        return Ok(next.clone());
    };

    let mut merged = prior_map.clone();
    for (rule_id, setting) in next_map {
        let combined = match merged.get(rule_id) {
            Some(existing) => merge_rule(existing, setting),
            None => setting.clone(),
        };
        merged.insert(rule_id.clone(), combined);
    }
    Ok(ConfigValue::Object(merged))
}
