//! Virtual-path expansion through content processors
//!
//! A processor splits one file into named blocks. Each block gets a virtual
//! path (the real path plus the block's filename) that is resolved against
//! the same fragment sequence as the real file, so patterns such as
//! `**/*.md/*.js` can configure embedded code. A block whose configuration
//! names another processor is expanded again, up to a bounded depth.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config_array::{ConfigArray, ResolvedPath};
use crate::error::ConfigError;
use crate::plugin::Processor;
use crate::resolver::ConfigResolver;
use crate::result::Result;
use crate::rules::Severity;

/// A text replacement proposed by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fix {
    /// Byte range in the block text
    pub range: (usize, usize),
    pub text: String,
}

/// One problem reported for a (possibly virtual) file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMessage {
    pub rule_id: Option<String>,
    pub message: String,
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
}

impl LintMessage {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule_id: Some(rule_id.into()),
            message: message.into(),
            severity,
            line: 1,
            column: 1,
            fix: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_fix(mut self, range: (usize, usize), text: impl Into<String>) -> Self {
        self.fix = Some(Fix {
            range,
            text: text.into(),
        });
        self
    }
}

/// One block of an expansion
#[derive(Debug, Clone)]
pub struct ExpandedBlock {
    pub virtual_path: PathBuf,
    /// Name declared by the processor; equal to the file name for the identity block
    pub filename: String,
    pub text: String,
    pub resolved: Arc<ResolvedPath>,
    /// Whether fixes reported for this block may be applied
    pub fixable: bool,
    /// Nested expansion when the block's own configuration names a processor
    pub children: Option<Box<Expansion>>,
}

/// A file split into the blocks rules will run on
#[derive(Debug, Clone)]
pub struct Expansion {
    pub path: PathBuf,
    pub resolved: Arc<ResolvedPath>,
    pub processor: Option<Arc<Processor>>,
    pub blocks: Vec<ExpandedBlock>,
    /// Nesting level; 0 for the real file
    pub depth: usize,
}

impl Expansion {
    /// Whether the file was passed through unchanged
    pub fn is_identity(&self) -> bool {
        self.processor.is_none()
    }

    /// Blocks without nested expansions, depth first in block order
    ///
    /// Rule execution produces one message list per leaf, in this order.
    pub fn leaves(&self) -> Vec<&ExpandedBlock> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a ExpandedBlock>) {
        for block in &self.blocks {
            match &block.children {
                Some(children) => children.collect_leaves(leaves),
                None => leaves.push(block),
            }
        }
    }

    /// Drop fixes reported for leaves whose fixes may not be applied
    pub fn strip_ineligible_fixes(&self, results: &mut [Vec<LintMessage>]) {
        for (leaf, messages) in self.leaves().into_iter().zip(results.iter_mut()) {
            if leaf.fixable {
                continue;
            }
            for message in messages.iter_mut() {
                message.fix = None;
            }
        }
    }

    /// Join one message list per leaf into the list for the real file
    ///
    /// Nested expansions are rejoined first through their own processor.
    /// Blocks that received no configuration contribute nothing.
    pub fn postprocess(&self, mut results: Vec<Vec<LintMessage>>) -> Result<Vec<LintMessage>> {
        let expected = self.leaves().len();
        if results.len() != expected {
            return Err(ConfigError::processor(
                self.processor_name(),
                format!("expected {expected} result list(s), got {}", results.len()),
            ));
        }

        self.strip_ineligible_fixes(&mut results);
        self.rejoin(&mut results.into_iter())
    }

    fn rejoin(&self, results: &mut std::vec::IntoIter<Vec<LintMessage>>) -> Result<Vec<LintMessage>> {
        let mut per_block = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let messages = match &block.children {
                Some(children) => children.rejoin(results)?,
                None => results.next().unwrap_or_default(),
            };
            per_block.push(if block.resolved.is_matched() {
                messages
            } else {
                Vec::new()
            });
        }

        match &self.processor {
            Some(processor) => processor.postprocess(per_block, &self.path.to_string_lossy()),
            None => Ok(per_block.into_iter().flatten().collect()),
        }
    }

    fn processor_name(&self) -> String {
        self.processor
            .as_ref()
            .and_then(|processor| processor.meta.id())
            .unwrap_or_else(|| "<anonymous>".to_string())
    }
}

/// Expands files through the processors their configuration names
#[derive(Clone)]
pub struct ProcessorExpander {
    resolver: ConfigResolver,
    fix: bool,
}

impl ProcessorExpander {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self {
            resolver,
            fix: false,
        }
    }

    /// Whether fixes will be applied at all
    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    /// Split `path` into blocks and resolve each block
    pub async fn expand(&self, path: &Path, text: &str) -> Result<Expansion> {
        let path = self.resolver.absolute(path)?;
        let array = self.resolver.config_array_for_file(&path).await?;
        let resolved = array.resolve(&path)?;

        let expansion = self.expand_resolved(&array, resolved, text, Frame::root(self.fix))?;
        tracing::debug!(
            "Expanded {} into {} leaf block(s)",
            path.display(),
            expansion.leaves().len()
        );
        Ok(expansion)
    }

    fn expand_resolved(
        &self,
        array: &ConfigArray,
        resolved: Arc<ResolvedPath>,
        text: &str,
        frame: Frame,
    ) -> Result<Expansion> {
        let path = resolved.path.clone();
        let Some(processor) = resolved.config().and_then(|config| config.processor()).cloned()
        else {
            return Ok(Expansion {
                blocks: vec![ExpandedBlock {
                    virtual_path: path.clone(),
                    filename: file_name(&path),
                    text: text.to_string(),
                    resolved: resolved.clone(),
                    fixable: frame.fixable,
                    children: None,
                }],
                path,
                resolved,
                processor: None,
                depth: frame.depth,
            });
        };

        let name = processor
            .meta
            .id()
            .unwrap_or_else(|| "<anonymous>".to_string());
        if frame.depth > frame.limit {
            return Err(ConfigError::processor(
                name,
                format!(
                    "nesting depth {} exceeds the maximum of {} for {}",
                    frame.depth,
                    frame.limit,
                    path.display()
                ),
            ));
        }

        let fixable = frame.fixable && processor.supports_autofix;
        let limit = frame.limit.min(frame.depth.saturating_add(processor.max_depth));
        let blocks = processor.preprocess(text, &path.to_string_lossy())?;
        tracing::trace!(
            "{} produced {} block(s) for {}",
            name,
            blocks.len(),
            path.display()
        );

        let mut expanded = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.into_iter().enumerate() {
            if block.filename.is_empty() {
                return Err(ConfigError::processor(
                    name,
                    format!("code block {index} has no filename"),
                ));
            }
            let Some(segment) = block_segment(&block.filename) else {
                return Err(ConfigError::processor(
                    name,
                    format!(
                        "code block {index} filename \"{}\" does not stay beneath {}",
                        block.filename,
                        path.display()
                    ),
                ));
            };

            let virtual_path = path.join(segment);
            let block_resolved = array.resolve(&virtual_path)?;

            let nested = block_resolved
                .config()
                .and_then(|config| config.processor())
                .is_some_and(|next| {
                    !(Arc::ptr_eq(next, &processor)
                        && block.text == text
                        && virtual_path.extension() == path.extension())
                });

            let children = if nested {
                let child_frame = Frame {
                    depth: frame.depth + 1,
                    limit,
                    fixable,
                };
                Some(Box::new(self.expand_resolved(
                    array,
                    block_resolved.clone(),
                    &block.text,
                    child_frame,
                )?))
            } else {
                None
            };

            expanded.push(ExpandedBlock {
                virtual_path,
                filename: block.filename,
                text: block.text,
                resolved: block_resolved,
                fixable,
                children,
            });
        }

        Ok(Expansion {
            path,
            resolved,
            processor: Some(processor),
            blocks: expanded,
            depth: frame.depth,
        })
    }
}

/// Expansion state inherited from enclosing processors
#[derive(Debug, Clone, Copy)]
struct Frame {
    depth: usize,
    /// Deepest level a processor may run at
    limit: usize,
    fixable: bool,
}

impl Frame {
    fn root(fixable: bool) -> Self {
        Self {
            depth: 0,
            limit: usize::MAX,
            fixable,
        }
    }
}

/// A block filename as a relative path beneath the real file
///
/// Root and prefix components are dropped so `/x/0.js` nests like `x/0.js`;
/// `..` would escape the real file and is rejected.
fn block_segment(filename: &str) -> Option<PathBuf> {
    let mut segment = PathBuf::new();
    for component in Path::new(filename).components() {
        match component {
            Component::Normal(part) => segment.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return None,
        }
    }
    (!segment.as_os_str().is_empty()).then_some(segment)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
