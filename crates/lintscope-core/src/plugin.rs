//! Plugins and the capability objects they carry
//!
//! A plugin is a namespace of rule definitions, processors and parsers.
//! Processors and parsers are plain structs holding *optional* capability
//! trait objects, so the schema can inspect their shape at validation time
//! ("does this processor have both preprocess and postprocess?") instead of
//! failing later at use time.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::processor::LintMessage;
use crate::result::Result;

/// Identifying metadata of a plugin, processor or parser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub name: Option<String>,
    pub version: Option<String>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: None,
        }
    }

    /// `name@version`, `name`, or `None` for anonymous objects
    pub fn id(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        Some(match &self.version {
            Some(version) => format!("{name}@{version}"),
            None => name.clone(),
        })
    }
}

/// Metadata for one rule exposed by a plugin
///
/// Rule execution lives outside this crate; the resolver only needs to know
/// which rule-ids exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDefinition {
    pub description: Option<String>,
    pub fixable: bool,
    pub deprecated: bool,
}

impl RuleDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One named block produced by a processor's preprocess step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Declared name, appended to the real path to form the virtual path
    pub filename: String,
    pub text: String,
}

impl CodeBlock {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }
}

/// Split one file's text into named blocks
pub trait Preprocess: Send + Sync {
    fn preprocess(&self, text: &str, filename: &str) -> std::result::Result<Vec<CodeBlock>, String>;
}

/// Join one result list per block back into a list for the real file
pub trait Postprocess: Send + Sync {
    fn postprocess(&self, messages: Vec<Vec<LintMessage>>, filename: &str) -> Vec<LintMessage>;
}

/// Turn source text into a syntax tree (opaque to the resolver)
pub trait Parse: Send + Sync {
    fn parse(
        &self,
        text: &str,
        options: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String>;
}

impl<F> Preprocess for F
where
    F: Fn(&str, &str) -> std::result::Result<Vec<CodeBlock>, String> + Send + Sync,
{
    fn preprocess(&self, text: &str, filename: &str) -> std::result::Result<Vec<CodeBlock>, String> {
        self(text, filename)
    }
}

impl<F> Postprocess for F
where
    F: Fn(Vec<Vec<LintMessage>>, &str) -> Vec<LintMessage> + Send + Sync,
{
    fn postprocess(&self, messages: Vec<Vec<LintMessage>>, filename: &str) -> Vec<LintMessage> {
        self(messages, filename)
    }
}

impl<F> Parse for F
where
    F: Fn(&str, &serde_json::Value) -> std::result::Result<serde_json::Value, String> + Send + Sync,
{
    fn parse(
        &self,
        text: &str,
        options: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String> {
        self(text, options)
    }
}

/// Nesting limit for processors that do not declare one
pub const DEFAULT_PROCESSOR_DEPTH: usize = 4;

/// A content processor
pub struct Processor {
    pub meta: ObjectMeta,
    /// Whether fixes produced for this processor's blocks may be applied
    pub supports_autofix: bool,
    /// How many processor levels may sit beneath this one
    pub max_depth: usize,
    preprocess: Option<Arc<dyn Preprocess>>,
    postprocess: Option<Arc<dyn Postprocess>>,
}

impl Processor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::named(name),
            ..Self::anonymous()
        }
    }

    /// A processor without metadata; it cannot be printed by name
    pub fn anonymous() -> Self {
        Self {
            meta: ObjectMeta::default(),
            supports_autofix: false,
            max_depth: DEFAULT_PROCESSOR_DEPTH,
            preprocess: None,
            postprocess: None,
        }
    }

    pub fn with_preprocess<F>(self, preprocess: F) -> Self
    where
        F: Fn(&str, &str) -> std::result::Result<Vec<CodeBlock>, String> + Send + Sync + 'static,
    {
        self.with_preprocess_impl(Arc::new(preprocess))
    }

    pub fn with_postprocess<F>(self, postprocess: F) -> Self
    where
        F: Fn(Vec<Vec<LintMessage>>, &str) -> Vec<LintMessage> + Send + Sync + 'static,
    {
        self.with_postprocess_impl(Arc::new(postprocess))
    }

    /// Attach a preprocess capability implemented by a type
    pub fn with_preprocess_impl(mut self, preprocess: Arc<dyn Preprocess>) -> Self {
        self.preprocess = Some(preprocess);
        self
    }

    /// Attach a postprocess capability implemented by a type
    pub fn with_postprocess_impl(mut self, postprocess: Arc<dyn Postprocess>) -> Self {
        self.postprocess = Some(postprocess);
        self
    }

    pub fn with_autofix(mut self, supports_autofix: bool) -> Self {
        self.supports_autofix = supports_autofix;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn has_preprocess(&self) -> bool {
        self.preprocess.is_some()
    }

    pub fn has_postprocess(&self) -> bool {
        self.postprocess.is_some()
    }

    fn display_name(&self) -> String {
        self.meta.id().unwrap_or_else(|| "<anonymous>".to_string())
    }

    /// Run the preprocess capability
    pub fn preprocess(&self, text: &str, filename: &str) -> Result<Vec<CodeBlock>> {
        let preprocess = self.preprocess.as_ref().ok_or_else(|| {
            ConfigError::processor(self.display_name(), "missing preprocess() capability")
        })?;
        preprocess
            .preprocess(text, filename)
            .map_err(|message| ConfigError::processor(self.display_name(), message))
    }

    /// Run the postprocess capability
    pub fn postprocess(
        &self,
        messages: Vec<Vec<LintMessage>>,
        filename: &str,
    ) -> Result<Vec<LintMessage>> {
        let postprocess = self.postprocess.as_ref().ok_or_else(|| {
            ConfigError::processor(self.display_name(), "missing postprocess() capability")
        })?;
        Ok(postprocess.postprocess(messages, filename))
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("meta", &self.meta)
            .field("supports_autofix", &self.supports_autofix)
            .field("max_depth", &self.max_depth)
            .field("preprocess", &self.has_preprocess())
            .field("postprocess", &self.has_postprocess())
            .finish()
    }
}

/// Identity comparison: two processors are equal only if they are the same object
impl PartialEq for Processor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// A source parser
pub struct Parser {
    pub meta: ObjectMeta,
    parse: Option<Arc<dyn Parse>>,
}

impl Parser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::named(name),
            parse: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            meta: ObjectMeta::default(),
            parse: None,
        }
    }

    pub fn with_parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&str, &serde_json::Value) -> std::result::Result<serde_json::Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }

    pub fn has_parse(&self) -> bool {
        self.parse.is_some()
    }

    pub fn parse(&self, text: &str, options: &serde_json::Value) -> Result<serde_json::Value> {
        let name = self.meta.id().unwrap_or_else(|| "<anonymous>".to_string());
        let parse = self
            .parse
            .as_ref()
            .ok_or_else(|| ConfigError::processor(&name, "missing parse() capability"))?;
        parse
            .parse(text, options)
            .map_err(|message| ConfigError::processor(name, message))
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("meta", &self.meta)
            .field("parse", &self.has_parse())
            .finish()
    }
}

impl PartialEq for Parser {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// A plugin: rules, processors and parsers under one namespace
#[derive(Debug, Default)]
pub struct Plugin {
    pub meta: ObjectMeta,
    pub rules: IndexMap<String, RuleDefinition>,
    pub processors: IndexMap<String, Arc<Processor>>,
    pub parsers: IndexMap<String, Arc<Parser>>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::named(name),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.meta.version = Some(version.into());
        self
    }

    pub fn with_rule(mut self, id: impl Into<String>, rule: RuleDefinition) -> Self {
        self.rules.insert(id.into(), rule);
        self
    }

    /// Add several rules with default metadata
    pub fn with_rules<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.rules.insert(id.into(), RuleDefinition::default());
        }
        self
    }

    pub fn with_processor(mut self, name: impl Into<String>, processor: Processor) -> Self {
        self.processors.insert(name.into(), Arc::new(processor));
        self
    }

    pub fn with_parser(mut self, name: impl Into<String>, parser: Parser) -> Self {
        self.parsers.insert(name.into(), Arc::new(parser));
        self
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Plugins available to configuration files by name
///
/// Configuration files cannot hold in-memory objects, so a file's
/// `"plugins": {"md": "markdown"}` entry names a plugin registered here.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, plugin: Arc<Plugin>) {
        self.plugins.insert(name.into(), plugin);
    }

    pub fn with(mut self, name: impl Into<String>, plugin: Arc<Plugin>) -> Self {
        self.register(name, plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Plugin>> {
        self.plugins.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_meta_id() {
        let mut meta = ObjectMeta::named("markdown");
        assert_eq!(meta.id().as_deref(), Some("markdown"));
        meta.version = Some("1.2.0".to_string());
        assert_eq!(meta.id().as_deref(), Some("markdown@1.2.0"));
        assert_eq!(ObjectMeta::default().id(), None);
    }

    #[test]
    fn test_processor_capabilities() {
        let processor = Processor::new("md")
            .with_preprocess(|text, _| Ok(vec![CodeBlock::new("0.js", text)]));

        assert!(processor.has_preprocess());
        assert!(!processor.has_postprocess());

        let blocks = processor.preprocess("let a;", "doc.md").unwrap();
        assert_eq!(blocks, vec![CodeBlock::new("0.js", "let a;")]);

        let err = processor.postprocess(vec![], "doc.md").unwrap_err();
        assert!(err.to_string().contains("missing postprocess() capability"));
    }

    #[test]
    fn test_parser_capability() {
        let parser = Parser::new("custom")
            .with_parse(|text, _| Ok(serde_json::json!({"len": text.len()})));
        assert!(parser.has_parse());
        assert_eq!(
            parser.parse("abc", &serde_json::Value::Null).unwrap(),
            serde_json::json!({"len": 3})
        );
        assert!(!Parser::anonymous().has_parse());
    }
}
