//! Built-in fragments placed at the front of every sequence

use std::sync::Arc;

use crate::fragment::ConfigFragment;
use crate::plugin::{Plugin, RuleDefinition};
use crate::rules::BUILTIN_NAMESPACE;
use crate::value::ConfigValue;

/// Ignore patterns that stay active even when ignore handling is disabled
pub const DEFAULT_IGNORES: &[&str] = &["**/node_modules/", ".git/"];

/// Patterns of files linted without any explicit `files` entry
pub const DEFAULT_FILES: &[&str] = &["**/*.js", "**/*.mjs"];

/// Metadata for the rules that ship without a plugin prefix
pub fn builtin_plugin() -> Arc<Plugin> {
    Arc::new(
        Plugin::new("lintscope")
            .with_version(crate::VERSION)
            .with_rule(
                "semi",
                RuleDefinition::new()
                    .fixable()
                    .with_description("Require or disallow semicolons"),
            )
            .with_rule(
                "quotes",
                RuleDefinition::new()
                    .fixable()
                    .with_description("Enforce a consistent quote style"),
            )
            .with_rule(
                "eqeqeq",
                RuleDefinition::new()
                    .fixable()
                    .with_description("Require === and !=="),
            )
            .with_rule("prefer-const", RuleDefinition::new().fixable())
            .with_rule("no-var", RuleDefinition::new().fixable())
            .with_rule("curly", RuleDefinition::new().fixable())
            .with_rules([
                "no-unused-vars",
                "no-undef",
                "no-console",
                "no-debugger",
                "no-empty",
                "no-redeclare",
                "no-shadow",
                "camelcase",
                "strict",
            ]),
    )
}

/// The built-in fragments, in order
///
/// 1. the built-in rule namespace plus baseline language and linter options;
/// 2. the always-on default ignores;
/// 3. the default `files` entry;
/// 4. CommonJS parsing for `.cjs` files.
pub fn default_fragments(builtin: &Arc<Plugin>) -> Vec<ConfigFragment> {
    vec![
        ConfigFragment::named("lintscope/defaults")
            .with(
                "plugins",
                ConfigValue::object([(BUILTIN_NAMESPACE, ConfigValue::from(builtin.clone()))]),
            )
            .with(
                "languageOptions",
                ConfigValue::object([
                    ("sourceType", ConfigValue::from("module")),
                    ("ecmaVersion", ConfigValue::from("latest")),
                    (
                        "parserOptions",
                        ConfigValue::object(Vec::<(String, ConfigValue)>::new()),
                    ),
                ]),
            )
            .with(
                "linterOptions",
                ConfigValue::object([("reportUnusedDisableDirectives", ConfigValue::from("warn"))]),
            ),
        ConfigFragment::named("lintscope/ignores").with_ignores(DEFAULT_IGNORES.iter().copied()),
        ConfigFragment::named("lintscope/files").with_files(DEFAULT_FILES.iter().copied()),
        ConfigFragment::named("lintscope/commonjs")
            .with_files(["**/*.cjs"])
            .with(
                "languageOptions",
                ConfigValue::object([
                    ("sourceType", ConfigValue::from("commonjs")),
                    ("ecmaVersion", ConfigValue::from("latest")),
                ]),
            ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    #[test]
    fn test_defaults_are_valid() {
        let registry = SchemaRegistry::new();
        for fragment in default_fragments(&builtin_plugin()) {
            registry.validate_fragment(&fragment).unwrap();
        }
    }

    #[test]
    fn test_default_ignore_fragment_is_global() {
        let fragments = default_fragments(&builtin_plugin());
        assert!(fragments[1].is_global_ignore());
        assert!(!fragments[0].is_global_ignore());
    }
}
