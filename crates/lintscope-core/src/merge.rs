//! Folding fragments into one normalized configuration
//!
//! [`FragmentMerger`] folds the raw entries of the matching fragments left
//! to right through the [`SchemaRegistry`], then finalizes the result into a
//! typed [`NormalizedConfig`]: severities are normalized, rule-ids are
//! checked against the plugin table, and named parsers and processors are
//! looked up in their plugins.

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{ConfigError, KeyPath};
use crate::fragment::ConfigFragment;
use crate::plugin::{Parser, Plugin, Processor};
use crate::result::{Result, ResultExt};
use crate::rules::{RuleEntry, Severity, resolve_rule, split_rule_id};
use crate::schema::SchemaRegistry;
use crate::value::ConfigValue;

/// Merges ordered fragments using a schema registry
#[derive(Debug, Clone)]
pub struct FragmentMerger {
    schema: Arc<SchemaRegistry>,
}

impl FragmentMerger {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Merge the raw entries of `fragments`, later fragments winning
    pub fn merge_raw<'a, I>(&self, fragments: I) -> Result<IndexMap<String, ConfigValue>>
    where
        I: IntoIterator<Item = &'a ConfigFragment>,
    {
        let mut merged = IndexMap::new();
        for fragment in fragments {
            merged = self.schema.merge_entries(&merged, &fragment.entries)?;
        }
        Ok(merged)
    }

    /// Merge and finalize
    pub fn merge<'a, I>(&self, fragments: I) -> Result<NormalizedConfig>
    where
        I: IntoIterator<Item = &'a ConfigFragment>,
    {
        let merged = self.merge_raw(fragments)?;
        NormalizedConfig::from_entries(&merged)
    }
}

/// ECMAScript version a file is parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcmaVersion {
    Latest,
    Year(u64),
}

impl EcmaVersion {
    /// Edition numbers from 6 upward are mapped to their year (6 → 2015)
    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) if s == "latest" => Some(EcmaVersion::Latest),
            ConfigValue::Number(n) => {
                let version = n.as_u64()?;
                Some(EcmaVersion::Year(if (6..2015).contains(&version) {
                    version + 2009
                } else {
                    version
                }))
            }
            _ => None,
        }
    }
}

impl Serialize for EcmaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            EcmaVersion::Latest => serializer.serialize_str("latest"),
            EcmaVersion::Year(year) => serializer.serialize_u64(*year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Script,
    Module,
    CommonJs,
}

impl SourceType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "script" => Some(SourceType::Script),
            "module" => Some(SourceType::Module),
            "commonjs" => Some(SourceType::CommonJs),
            _ => None,
        }
    }
}

/// Access level of a declared global variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalAccess {
    Readonly,
    Writable,
    Off,
}

impl GlobalAccess {
    /// `true` and `"writeable"` are synonyms of `"writable"`, `false` of `"readonly"`
    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(true) => Some(GlobalAccess::Writable),
            ConfigValue::Bool(false) => Some(GlobalAccess::Readonly),
            ConfigValue::String(s) => match s.as_str() {
                "readonly" => Some(GlobalAccess::Readonly),
                "writable" | "writeable" => Some(GlobalAccess::Writable),
                "off" => Some(GlobalAccess::Off),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A parser or processor reference as written in a fragment
#[derive(Debug)]
pub enum ObjectRef<T> {
    /// `plugin/name`, looked up in the plugin table
    Named(String),
    Inline(Arc<T>),
}

impl<T> Clone for ObjectRef<T> {
    fn clone(&self) -> Self {
        match self {
            ObjectRef::Named(name) => ObjectRef::Named(name.clone()),
            ObjectRef::Inline(object) => ObjectRef::Inline(object.clone()),
        }
    }
}

pub type ProcessorRef = ObjectRef<Processor>;
pub type ParserRef = ObjectRef<Parser>;

/// A parser or processor after lookup, with the name it serializes as
#[derive(Debug)]
pub struct Resolved<T> {
    pub name: Option<String>,
    pub object: Arc<T>,
}

impl<T> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            object: self.object.clone(),
        }
    }
}

impl<T> Resolved<T> {
    pub fn is(&self, other: &Arc<T>) -> bool {
        Arc::ptr_eq(&self.object, other)
    }
}

pub type ResolvedProcessor = Resolved<Processor>;
pub type ResolvedParser = Resolved<Parser>;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecma_version: Option<EcmaVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub globals: IndexMap<String, GlobalAccess>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_parser"
    )]
    pub parser: Option<ResolvedParser>,
    pub parser_options: Map<String, Value>,
}

fn serialize_parser<S: Serializer>(
    parser: &Option<ResolvedParser>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match parser.as_ref().map(|parser| parser.name.as_deref()) {
        Some(Some(name)) => serializer.serialize_str(name),
        Some(None) => Err(S::Error::custom(
            "Could not serialize parser object (missing 'meta' object).",
        )),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinterOptions {
    pub no_inline_config: bool,
    pub report_unused_disable_directives: Severity,
}

impl Default for LinterOptions {
    fn default() -> Self {
        Self {
            no_inline_config: false,
            report_unused_disable_directives: Severity::Off,
        }
    }
}

/// The effective configuration for one path
///
/// Built once per distinct set of matching fragments and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct NormalizedConfig {
    pub plugins: IndexMap<String, Arc<Plugin>>,
    pub rules: IndexMap<String, RuleEntry>,
    pub settings: Map<String, Value>,
    pub language_options: LanguageOptions,
    pub linter_options: LinterOptions,
    pub processor: Option<ResolvedProcessor>,
}

impl NormalizedConfig {
    /// Finalize merged raw entries
    pub fn from_entries(entries: &IndexMap<String, ConfigValue>) -> Result<Self> {
        let mut config = NormalizedConfig::default();

        if let Some(plugins) = entries.get("plugins").and_then(ConfigValue::as_object) {
            for (namespace, plugin) in plugins {
                if let ConfigValue::Plugin(plugin) = plugin {
                    config.plugins.insert(namespace.clone(), plugin.clone());
                }
            }
        }

        if let Some(settings) = entries.get("settings") {
            config.settings = json_object(settings);
        }

        if let Some(options) = entries.get("languageOptions").and_then(ConfigValue::as_object) {
            config.language_options = config
                .language_options_from(options)
                .under_key("languageOptions")?;
        }

        if let Some(options) = entries.get("linterOptions").and_then(ConfigValue::as_object) {
            if let Some(ConfigValue::Bool(flag)) = options.get("noInlineConfig") {
                config.linter_options.no_inline_config = *flag;
            }
            config.linter_options.report_unused_disable_directives =
                match options.get("reportUnusedDisableDirectives") {
                    Some(ConfigValue::Bool(true)) => Severity::Warn,
                    Some(ConfigValue::Bool(false)) | None => Severity::Off,
                    Some(other) => Severity::from_value(other).unwrap_or(Severity::Off),
                };
        }

        if let Some(processor) = entries.get("processor") {
            let reference = match processor {
                ConfigValue::String(name) => ProcessorRef::Named(name.clone()),
                ConfigValue::Processor(processor) => ProcessorRef::Inline(processor.clone()),
                other => {
                    return Err(ConfigError::schema_at(
                        "processor",
                        format!("Expected an object or a string, found {}.", other.type_name()),
                    ));
                }
            };
            config.processor = Some(
                resolve_object(&reference, &config.plugins, |plugin| &plugin.processors, |p| {
                    p.meta.id()
                })
                .under_key("processor")?,
            );
        }

        if let Some(rules) = entries.get("rules").and_then(ConfigValue::as_object) {
            for (rule_id, setting) in rules {
                let entry = RuleEntry::from_value(setting)
                    .under_key(rule_id)
                    .under_key("rules")?;
                if entry.is_enabled() {
                    resolve_rule(rule_id, &config.plugins).under_key("rules")?;
                }
                config.rules.insert(rule_id.clone(), entry);
            }
        }

        Ok(config)
    }

    fn language_options_from(
        &self,
        options: &IndexMap<String, ConfigValue>,
    ) -> Result<LanguageOptions> {
        let mut language_options = LanguageOptions {
            ecma_version: options.get("ecmaVersion").and_then(EcmaVersion::from_value),
            source_type: options
                .get("sourceType")
                .and_then(ConfigValue::as_str)
                .and_then(SourceType::from_name),
            ..Default::default()
        };

        if let Some(globals) = options.get("globals").and_then(ConfigValue::as_object) {
            for (name, access) in globals {
                if let Some(access) = GlobalAccess::from_value(access) {
                    language_options.globals.insert(name.clone(), access);
                }
            }
        }

        if let Some(parser_options) = options.get("parserOptions") {
            language_options.parser_options = json_object(parser_options);
        }

        if let Some(parser) = options.get("parser") {
            let reference = match parser {
                ConfigValue::String(name) => ParserRef::Named(name.clone()),
                ConfigValue::Parser(parser) => ParserRef::Inline(parser.clone()),
                other => {
                    return Err(ConfigError::schema_at(
                        "parser",
                        format!("Expected an object or string, found {}.", other.type_name()),
                    ));
                }
            };
            language_options.parser = Some(
                resolve_object(&reference, &self.plugins, |plugin| &plugin.parsers, |p| {
                    p.meta.id()
                })
                .under_key("parser")?,
            );
        }

        Ok(language_options)
    }

    pub fn rule(&self, rule_id: &str) -> Option<&RuleEntry> {
        self.rules.get(rule_id)
    }

    /// Severity of a rule, `Off` when not configured
    pub fn severity(&self, rule_id: &str) -> Severity {
        self.rules
            .get(rule_id)
            .map(|entry| entry.severity)
            .unwrap_or(Severity::Off)
    }

    pub fn processor(&self) -> Option<&Arc<Processor>> {
        self.processor.as_ref().map(|resolved| &resolved.object)
    }

    /// JSON form for inspection; fails for anonymous parsers and processors
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|err| ConfigError::schema(err.to_string()))
    }
}

impl Serialize for NormalizedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let plugins: Vec<String> = self
            .plugins
            .iter()
            .map(|(namespace, plugin)| match plugin.meta.id() {
                Some(id) => format!("{namespace}:{id}"),
                None => namespace.clone(),
            })
            .collect();

        let mut state = serializer.serialize_struct("NormalizedConfig", 6)?;
        state.serialize_field("plugins", &plugins)?;
        state.serialize_field("languageOptions", &self.language_options)?;
        state.serialize_field("linterOptions", &self.linter_options)?;
        if let Some(processor) = &self.processor {
            let name = processor.name.as_deref().ok_or_else(|| {
                S::Error::custom("Could not serialize processor object (missing 'meta' object).")
            })?;
            state.serialize_field("processor", name)?;
        }
        state.serialize_field("rules", &self.rules)?;
        state.serialize_field("settings", &self.settings)?;
        state.end()
    }
}

fn json_object(value: &ConfigValue) -> Map<String, Value> {
    match value.to_json() {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Look up a named parser/processor in the plugin table, or accept an inline one
fn resolve_object<T>(
    reference: &ObjectRef<T>,
    plugins: &IndexMap<String, Arc<Plugin>>,
    table: impl Fn(&Plugin) -> &IndexMap<String, Arc<T>>,
    id: impl Fn(&T) -> Option<String>,
) -> Result<Resolved<T>> {
    match reference {
        ObjectRef::Inline(object) => Ok(Resolved {
            name: id(object),
            object: object.clone(),
        }),
        ObjectRef::Named(name) => {
            let (namespace, local) = split_rule_id(name);
            plugins
                .get(namespace)
                .and_then(|plugin| table(plugin).get(local))
                .map(|object| Resolved {
                    name: Some(name.clone()),
                    object: object.clone(),
                })
                .ok_or_else(|| {
                    ConfigError::plugin_resolution(
                        KeyPath::new(),
                        format!(r#"Could not find "{local}" in plugin "{namespace}"."#),
                    )
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{CodeBlock, RuleDefinition};
    use serde_json::json;

    fn merger() -> FragmentMerger {
        FragmentMerger::new(Arc::new(SchemaRegistry::new()))
    }

    fn builtin() -> Arc<Plugin> {
        Arc::new(
            Plugin::new("builtin")
                .with_rules(["semi", "quotes", "no-unused-vars"])
                .with_rule("eqeqeq", RuleDefinition::new().fixable()),
        )
    }

    fn base() -> ConfigFragment {
        ConfigFragment::new().with(
            "plugins",
            ConfigValue::object([("@", ConfigValue::from(builtin()))]),
        )
    }

    fn fragment(value: serde_json::Value) -> ConfigFragment {
        ConfigFragment::from_value(&ConfigValue::from(value)).unwrap()
    }

    #[test]
    fn test_later_fragment_wins_on_overlap() {
        let config = merger()
            .merge(&[
                base(),
                fragment(json!({"rules": {"semi": ["error", "always"]}, "settings": {"a": 1}})),
                fragment(json!({"rules": {"semi": "warn"}, "settings": {"a": 2, "b": 3}})),
            ])
            .unwrap();

        let semi = config.rule("semi").unwrap();
        assert_eq!(semi.severity, Severity::Warn);
        assert_eq!(semi.options, vec![json!("always")]);
        assert_eq!(Value::Object(config.settings), json!({"a": 2, "b": 3}));
    }

    #[test]
    fn test_unknown_rule_is_rejected_unless_off() {
        let err = merger()
            .merge(&[base(), fragment(json!({"rules": {"semy": "error"}}))])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Key "rules": Key "semy": Could not find "semy" in plugin "@". Did you mean "semi"?"#
        );

        let config = merger()
            .merge(&[base(), fragment(json!({"rules": {"react/jsx": "off"}}))])
            .unwrap();
        assert_eq!(config.severity("react/jsx"), Severity::Off);
    }

    #[test]
    fn test_language_options_normalization() {
        let config = merger()
            .merge(&[
                fragment(json!({"languageOptions": {"ecmaVersion": 6, "globals": {"a": true}}})),
                fragment(json!({"languageOptions": {
                    "sourceType": "commonjs",
                    "globals": {"b": "writeable", "c": false}
                }})),
            ])
            .unwrap();

        let options = &config.language_options;
        assert_eq!(options.ecma_version, Some(EcmaVersion::Year(2015)));
        assert_eq!(options.source_type, Some(SourceType::CommonJs));
        assert_eq!(options.globals["a"], GlobalAccess::Writable);
        assert_eq!(options.globals["b"], GlobalAccess::Writable);
        assert_eq!(options.globals["c"], GlobalAccess::Readonly);
    }

    #[test]
    fn test_named_processor_lookup() {
        let markdown = Processor::new("markdown")
            .with_preprocess(|text, _| Ok(vec![CodeBlock::new("0.js", text)]))
            .with_postprocess(|lists, _| lists.into_iter().flatten().collect());
        let plugin = Arc::new(Plugin::new("md").with_processor("markdown", markdown));
        let plugins = ConfigFragment::new().with(
            "plugins",
            ConfigValue::object([("md", ConfigValue::from(plugin.clone()))]),
        );

        let config = merger()
            .merge(&[plugins.clone(), fragment(json!({"processor": "md/markdown"}))])
            .unwrap();
        assert!(config.processor.as_ref().unwrap().is(&plugin.processors["markdown"]));
        assert_eq!(config.to_json().unwrap()["processor"], json!("md/markdown"));

        let err = merger()
            .merge(&[plugins, fragment(json!({"processor": "md/unknown"}))])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Key "processor": Could not find "unknown" in plugin "md"."#
        );
    }

    #[test]
    fn test_anonymous_processor_cannot_be_serialized() {
        let anonymous = Arc::new(
            Processor::anonymous()
                .with_preprocess(|_, _| Ok(Vec::new()))
                .with_postprocess(|_, _| Vec::new()),
        );
        let config = merger()
            .merge(&[ConfigFragment::new().with("processor", anonymous)])
            .unwrap();

        let err = config.to_json().unwrap_err();
        assert!(err.to_string().contains("missing 'meta' object"));
    }

    #[test]
    fn test_serialized_form() {
        let config = merger()
            .merge(&[
                base(),
                fragment(json!({
                    "linterOptions": {"reportUnusedDisableDirectives": true},
                    "rules": {"eqeqeq": ["error", "smart"]}
                })),
            ])
            .unwrap();

        assert_eq!(
            config.to_json().unwrap(),
            json!({
                "plugins": ["@:builtin"],
                "languageOptions": {"parserOptions": {}},
                "linterOptions": {"noInlineConfig": false, "reportUnusedDisableDirectives": 1},
                "rules": {"eqeqeq": [2, "smart"]},
                "settings": {}
            })
        );
    }
}
