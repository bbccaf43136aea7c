//! lintscope Core
//!
//! Configuration resolution engine for the lintscope static-analysis tool.
//! Given any file path, this crate finds the configuration source that
//! governs it, merges the ordered configuration fragments that apply to it,
//! and decides whether the path is ignored, unmatched, or linted with one
//! effective configuration. Content processors can split a file into
//! virtual sub-files that are resolved the same way.

pub mod cache;
pub mod config_array;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod fragment;
pub mod loader;
pub mod locator;
pub mod matcher;
pub mod merge;
pub mod plugin;
pub mod processor;
pub mod resolver;
pub mod result;
pub mod rules;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use cache::{CacheStats, ConfigCache, SingleFlight};
pub use config_array::{ConfigArray, ConfigArrayBuilder, ResolvedPath, Verdict};
pub use diagnostics::{ConfigWarning, IgnoreReason, PathDiagnostic};
pub use error::{ConfigError, ErrorKind, KeyPath};
pub use fragment::{ConfigFragment, FilesEntry};
pub use loader::{
    FileSourceLoader, IgnoreFileLoader, LoadedSource, SourceFingerprint, SourceLoader,
};
pub use locator::{CONFIG_FILENAMES, ConfigFileMode, ConfigLocator, LocatedSource};
pub use matcher::{Classification, PathMatcher};
pub use merge::{
    EcmaVersion, FragmentMerger, GlobalAccess, LanguageOptions, LinterOptions, NormalizedConfig,
    ParserRef, ProcessorRef, ResolvedParser, ResolvedProcessor, SourceType,
};
pub use plugin::{
    CodeBlock, ObjectMeta, Parser, Plugin, PluginRegistry, Processor, RuleDefinition,
};
pub use processor::{ExpandedBlock, Expansion, Fix, LintMessage, ProcessorExpander};
pub use resolver::{BatchResolution, ConfigResolver, ResolverOptions};
pub use result::{Result, ResultExt};
pub use rules::{RuleEntry, Severity};
pub use schema::SchemaRegistry;
pub use value::ConfigValue;

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lintscope_core=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
