//! Read-time value transformation
//!
//! Raw values are stored exactly as parsed. Every read of a resolved value
//! runs three stages in order:
//!
//! 1. the custom [`Transformer`] hook, if configured, replaces the raw value;
//! 2. `%(name)s` markers are replaced by the raw value of key `name` from the
//!    same section (or its parents), falling back to the default section;
//! 3. `${NAME}`, `${NAME??default}` and `${NAME||default}` markers are
//!    replaced through a [`VariableHandler`].
//!
//! Both substitution stages stop after [`MAX_SUBSTITUTION_DEPTH`] steps, which
//! also bounds cyclic references. Markers that cannot be resolved are left in
//! place.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::options::Options;
use crate::parser::has_surrounded_quote;
use crate::registry::{DEFAULT_SECTION, Key, Registry, Section};

/// Maximum number of substitutions per stage
pub const MAX_SUBSTITUTION_DEPTH: usize = 99;

/// User hook replacing the raw value before substitution
pub type Transformer = Arc<dyn Fn(&TransformContext<'_>) -> String + Send + Sync>;

static REFERENCE_PATTERN: OnceLock<Regex> = OnceLock::new();
static ENVIRONMENT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn reference_pattern() -> &'static Regex {
    REFERENCE_PATTERN.get_or_init(|| Regex::new(r"%\(([^)]+)\)s").expect("valid pattern"))
}

fn environment_pattern() -> &'static Regex {
    ENVIRONMENT_PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid pattern"))
}

/// Trait for resolving `${NAME}` markers
pub trait VariableHandler {
    /// Returns the value of `name`, or `None` when it is not set at all
    fn resolve_variable(&self, name: &str) -> Option<String>;
}

/// Resolves variables from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVariableHandler;

impl VariableHandler for EnvironmentVariableHandler {
    fn resolve_variable(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
    }
}

/// Map-based variable handler
#[derive(Debug, Clone, Default)]
pub struct MapVariableHandler {
    variables: HashMap<String, String>,
}

impl MapVariableHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler from an existing map
    pub fn from_map(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }
}

impl VariableHandler for MapVariableHandler {
    fn resolve_variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapVariableHandler {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The key being resolved, with the section and registry it lives in
pub struct TransformContext<'a> {
    registry: &'a Registry,
    options: &'a Options,
    section: &'a Section,
    key: &'a Key,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        registry: &'a Registry,
        options: &'a Options,
        section: &'a Section,
        key: &'a Key,
    ) -> Self {
        Self {
            registry,
            options,
            section,
            key,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn options(&self) -> &'a Options {
        self.options
    }

    pub fn section(&self) -> &'a Section {
        self.section
    }

    pub fn key(&self) -> &'a Key {
        self.key
    }

    /// Runs all transformation stages on the key
    pub fn resolve(&self) -> String {
        let value = match &self.options.transformer {
            Some(transformer) => transformer(self),
            None => self.key.value().to_string(),
        };
        let value = self.substitute_references(value);
        substitute_environment(&value, self.options.variables.as_ref())
    }

    fn substitute_references(&self, mut value: String) -> String {
        if !value.contains('%') {
            return value;
        }

        let delimiter = self.options.child_section_delimiter.as_str();
        for _ in 0..MAX_SUBSTITUTION_DEPTH {
            let Some((range, name)) = find_marker(reference_pattern(), &value) else {
                break;
            };
            let name = self.options.key_name(&name);

            // Skip the key itself, then fall back to the default section
            let found = self
                .registry
                .find_key(self.section.name(), &name, delimiter)
                .filter(|(section, key)| !self.is_self(section, key))
                .or_else(|| self.registry.find_key(DEFAULT_SECTION, &name, delimiter));

            let Some((_, target)) = found else {
                break;
            };
            value.replace_range(range, target.value());
        }
        value
    }

    fn is_self(&self, section: &Section, key: &Key) -> bool {
        section.name() == self.section.name() && key.name() == self.key.name()
    }
}

/// Resolves the value of `key` in `section`, applying case folding and
/// parent-section lookup
///
/// Returns `None` when the key does not exist.
pub fn resolve_value(
    registry: &Registry,
    options: &Options,
    section: &str,
    key: &str,
) -> Option<String> {
    let section = options.section_name(section);
    let key = options.key_name(key);
    let (section, key) = registry.find_key(&section, &key, &options.child_section_delimiter)?;
    Some(TransformContext::new(registry, options, section, key).resolve())
}

/// Replaces `${NAME}` markers using `variables`
///
/// `??` keeps a set-but-empty variable, `||` (and the bare form) replace an
/// empty variable with the default. Defaults are trimmed and may be quoted.
pub fn substitute_environment(value: &str, variables: &dyn VariableHandler) -> String {
    let mut value = value.to_string();
    if !value.contains('$') {
        return value;
    }

    for _ in 0..MAX_SUBSTITUTION_DEPTH {
        let Some((range, marker)) = find_marker(environment_pattern(), &value) else {
            break;
        };

        let (name, default, force) = match marker.split_once("??") {
            Some((name, default)) => (name, Some(default), false),
            None => match marker.split_once("||") {
                Some((name, default)) => (name, Some(default), true),
                None => (marker.as_str(), None, true),
            },
        };
        let default = default.map_or("", |d| trim_quote(d.trim()));

        let resolved = match variables.resolve_variable(name.trim()) {
            Some(found) if !(found.is_empty() && force) => found,
            _ => default.to_string(),
        };
        value.replace_range(range, &resolved);
    }
    value
}

/// Range of the first match of `pattern` and its first capture group
fn find_marker(pattern: &Regex, text: &str) -> Option<(Range<usize>, String)> {
    let captures = pattern.captures(text)?;
    Some((captures.get(0)?.range(), captures.get(1)?.as_str().to_string()))
}

fn trim_quote(text: &str) -> &str {
    if has_surrounded_quote(text, '\'') || has_surrounded_quote(text, '"') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}
