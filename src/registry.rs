//! Section and key storage
//!
//! The registry is plain data: names are stored exactly as given (case
//! folding is applied by the callers from [`Options`](crate::Options)), and
//! creation is always lookup-or-create, so the first declaration of a name
//! wins.

use indexmap::IndexMap;
use serde::Serialize;

/// Name of the implicit section holding keys declared before any header
pub const DEFAULT_SECTION: &str = "";

/// A key with its raw, untransformed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Key {
    name: String,
    value: String,
    /// Comment lines attached to the key
    pub comment: String,
    /// Name generated from the `-` placeholder (`#1`, `#2`, ...)
    pub auto_increment: bool,
    /// Declared without `=value`
    pub boolean: bool,
}

impl Key {
    /// Creates a key with the given raw value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            comment: String::new(),
            auto_increment: false,
            boolean: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value as stored by the parser
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }
}

/// A named, ordered group of keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    name: String,
    /// Comment lines attached to the section header
    pub comment: String,
    keys: IndexMap<String, Key>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            keys: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the existing key or creates it with `value`
    pub fn new_key(&mut self, name: &str, value: impl Into<String>) -> &mut Key {
        self.keys
            .entry(name.to_string())
            .or_insert_with(|| Key::new(name, value))
    }

    /// Returns the existing key or creates it with the value `"true"`,
    /// marking it as a boolean key either way
    pub fn new_boolean_key(&mut self, name: &str) -> &mut Key {
        let key = self.new_key(name, "true");
        key.boolean = true;
        key
    }

    pub fn key(&self, name: &str) -> Option<&Key> {
        self.keys.get(name)
    }

    pub fn key_mut(&mut self, name: &str) -> Option<&mut Key> {
        self.keys.get_mut(name)
    }

    /// Keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.values()
    }

    pub fn key_names(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    /// Returns true if any key holds exactly this raw value
    pub fn has_value(&self, value: &str) -> bool {
        self.keys.values().any(|key| key.value == value)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// All sections of a manager, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    sections: IndexMap<String, Section>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing section or creates an empty one
    ///
    /// A repeated header therefore accumulates into the first section of
    /// that name.
    pub fn new_section(&mut self, name: &str) -> &mut Section {
        self.sections
            .entry(name.to_string())
            .or_insert_with(|| Section::new(name))
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.get_mut(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    /// Looks up `key` in `section`, then in the nearest existing parent
    ///
    /// Parents are found by cutting `section` at the last `child_delimiter`,
    /// so `a.b.c` falls back to `a.b` and then `a`. The section itself does
    /// not need to exist. Names must already be case folded.
    pub fn find_key(
        &self,
        section: &str,
        key: &str,
        child_delimiter: &str,
    ) -> Option<(&Section, &Key)> {
        if let Some(found) = self
            .section(section)
            .and_then(|s| s.key(key).map(|k| (s, k)))
        {
            return Some(found);
        }
        if child_delimiter.is_empty() {
            return None;
        }

        let mut name = section;
        while let Some(i) = name.rfind(child_delimiter) {
            name = &name[..i];
            if self.section(name).is_some() {
                return self.find_key(name, key, child_delimiter);
            }
        }
        None
    }

    /// Removes every section, as done before a full reload
    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
